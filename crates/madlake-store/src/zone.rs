//! Zone model
//!
//! A zone is a logical storage partition of the lake with a fixed contract:
//! the Raw zone holds byte-identical source extracts, the Process zone holds
//! per-source cleaned datasets in parquet, the Access zone holds enriched
//! analysis-ready datasets and warehouse snapshots, and the Governance zone
//! holds lineage logs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Zone {
    Raw,
    Process,
    Access,
    Governance,
}

impl Zone {
    /// Bucket name backing this zone in the object store.
    pub fn bucket(&self) -> &'static str {
        match self {
            Zone::Raw => "raw-ingestion-zone",
            Zone::Process => "process-zone",
            Zone::Access => "access-zone",
            Zone::Governance => "governance-zone",
        }
    }

    pub const ALL: [Zone; 4] = [Zone::Raw, Zone::Process, Zone::Access, Zone::Governance];
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.bucket())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_names_are_fixed() {
        assert_eq!(Zone::Raw.bucket(), "raw-ingestion-zone");
        assert_eq!(Zone::Process.bucket(), "process-zone");
        assert_eq!(Zone::Access.bucket(), "access-zone");
        assert_eq!(Zone::Governance.to_string(), "governance-zone");
    }
}
