//! Object-store gateway
//!
//! The pipeline talks to storage only through the [`ObjectStore`] contract:
//! content goes in and out of named zones as bytes plus a descriptive
//! key-value metadata map. [`S3Store`] is the production gateway (S3 or
//! MinIO); [`MemoryStore`] backs tests and dry-runs.

use std::collections::BTreeMap;

use async_trait::async_trait;

use madlake_common::dataset::{Dataset, DatasetMeta};

use crate::codec;
use crate::error::StoreResult;
use crate::zone::Zone;

mod memory;
mod s3;

pub use memory::MemoryStore;
pub use s3::{S3Config, S3Store};

/// Storage/retrieval contract for zone objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object into a zone, overwriting any previous version
    /// (last-writer-wins per path).
    async fn put(
        &self,
        zone: Zone,
        path: &str,
        data: Vec<u8>,
        metadata: BTreeMap<String, String>,
    ) -> StoreResult<()>;

    /// Read an object's bytes.
    async fn get(&self, zone: Zone, path: &str) -> StoreResult<Vec<u8>>;

    /// Enumerate all object paths in a zone.
    async fn list(&self, zone: Zone) -> StoreResult<Vec<String>>;
}

/// Encode a dataset as parquet and upload it with its metadata.
pub async fn put_dataset(
    store: &dyn ObjectStore,
    zone: Zone,
    path: &str,
    dataset: &Dataset,
    meta: &DatasetMeta,
) -> StoreResult<()> {
    let bytes = codec::encode_parquet(dataset)?;
    store.put(zone, path, bytes, meta.to_map()).await
}

/// Download and decode a parquet dataset. The dataset takes its name from
/// the final path segment, extension stripped.
pub async fn get_dataset(store: &dyn ObjectStore, zone: Zone, path: &str) -> StoreResult<Dataset> {
    let bytes = store.get(zone, path).await?;
    let name = path
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".parquet");
    codec::decode_parquet(name, bytes)
}
