//! Lineage recording
//!
//! Every zone-to-zone transfer appends one immutable [`LineageRecord`]:
//! source, destination, transformation description, timestamp. Records are
//! never updated or deleted. The pipeline treats recording as fire-and-forget
//! with no read-back contract.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::store::ObjectStore;
use crate::zone::Zone;

/// One immutable audit entry describing a transfer.
///
/// Zones are free-form strings so sources outside the lake ("local",
/// "warehouse") can be named too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageRecord {
    pub source_zone: String,
    pub source_path: String,
    pub dest_zone: String,
    pub dest_path: String,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl LineageRecord {
    pub fn new(
        source_zone: impl Into<String>,
        source_path: impl Into<String>,
        dest_zone: impl Into<String>,
        dest_path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            source_zone: source_zone.into(),
            source_path: source_path.into(),
            dest_zone: dest_zone.into(),
            dest_path: dest_path.into(),
            description: description.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Fire-and-forget lineage sink.
#[async_trait]
pub trait LineageRecorder: Send + Sync {
    async fn record(&self, record: LineageRecord);
}

/// Lineage recorder that buffers records for one stage run and flushes them
/// as a JSON-lines object into the Governance zone.
pub struct StoreLineage {
    store: Arc<dyn ObjectStore>,
    run_id: Uuid,
    buffer: Mutex<Vec<LineageRecord>>,
}

impl StoreLineage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            run_id: Uuid::new_v4(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Write the buffered records for this stage run and clear the buffer.
    /// The object path embeds the run id, so earlier runs stay untouched.
    pub async fn flush(&self, stage: &str) -> StoreResult<()> {
        let records: Vec<LineageRecord> = {
            let mut buffer = match self.buffer.lock() {
                Ok(buffer) => buffer,
                Err(_) => {
                    warn!("Lineage buffer lock poisoned; dropping records");
                    return Ok(());
                },
            };
            std::mem::take(&mut *buffer)
        };
        if records.is_empty() {
            return Ok(());
        }

        let mut lines = String::new();
        for record in &records {
            match serde_json::to_string(record) {
                Ok(line) => {
                    lines.push_str(&line);
                    lines.push('\n');
                },
                Err(err) => warn!(error = %err, "Failed to serialize lineage record"),
            }
        }

        let path = format!("lineage/{}-{}.jsonl", stage, self.run_id);
        let mut metadata = BTreeMap::new();
        metadata.insert("stage".to_string(), stage.to_string());
        metadata.insert("records".to_string(), records.len().to_string());
        self.store
            .put(Zone::Governance, &path, lines.into_bytes(), metadata)
            .await?;
        info!("Flushed {} lineage records to {}", records.len(), path);
        Ok(())
    }
}

#[async_trait]
impl LineageRecorder for StoreLineage {
    async fn record(&self, record: LineageRecord) {
        info!(
            source = %format!("{}/{}", record.source_zone, record.source_path),
            dest = %format!("{}/{}", record.dest_zone, record.dest_path),
            "{}", record.description
        );
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(record);
        }
    }
}

/// In-memory recorder for tests.
#[derive(Default)]
pub struct MemoryLineage {
    records: Mutex<Vec<LineageRecord>>,
}

impl MemoryLineage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LineageRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LineageRecorder for MemoryLineage {
    async fn record(&self, record: LineageRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}
