//! madlake store library
//!
//! Everything that sits at a zone boundary: the zone model, the object-store
//! gateway contract with its S3/MinIO and in-memory implementations, the
//! parquet codec used uniformly for the Process and Access zones, and the
//! lineage recorder that audits every zone-to-zone transfer.

pub mod codec;
pub mod error;
pub mod lineage;
pub mod store;
pub mod zone;

pub use error::{StoreError, StoreResult};
pub use lineage::{LineageRecord, LineageRecorder, MemoryLineage, StoreLineage};
pub use store::{get_dataset, put_dataset, MemoryStore, ObjectStore, S3Config, S3Store};
pub use zone::Zone;
