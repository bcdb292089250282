//! madlake pipeline library
//!
//! The staged transformation pipeline over the lake zones, plus the
//! dimensional warehouse loader:
//!
//! - [`stages::ingest`] copies source extracts into the Raw zone byte-for-byte
//! - [`stages::clean`] applies per-source cleaning recipes into the Process zone
//! - [`stages::enrich`] computes joins and derived measures into the Access zone
//! - [`warehouse`] materializes the star schema into Postgres and exports
//!   table snapshots back to the Access zone
//!
//! Stages are sequential batch jobs: each reads everything it needs from the
//! prior zone before writing its own outputs, and stages communicate only
//! through the zone boundary.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use madlake_store::{MemoryStore, StoreLineage};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let lineage = StoreLineage::new(store.clone());
//!     madlake_pipeline::stages::ingest::run(store.as_ref(), &lineage, "./data".as_ref()).await?;
//!     lineage.flush("ingest").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod stages;
pub mod warehouse;
