//! In-memory object store for tests and local dry-runs

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::zone::Zone;

use super::ObjectStore;

struct StoredObject {
    data: Vec<u8>,
    metadata: BTreeMap<String, String>,
}

/// Object store held entirely in memory. Same last-writer-wins semantics
/// per path as the S3 gateway.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(Zone, String), StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata attached to an object, if present. Test accessor.
    pub fn metadata_of(&self, zone: Zone, path: &str) -> Option<BTreeMap<String, String>> {
        self.objects
            .lock()
            .ok()?
            .get(&(zone, path.to_string()))
            .map(|o| o.metadata.clone())
    }

    pub fn contains(&self, zone: Zone, path: &str) -> bool {
        self.objects
            .lock()
            .map(|m| m.contains_key(&(zone, path.to_string())))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        zone: Zone,
        path: &str,
        data: Vec<u8>,
        metadata: BTreeMap<String, String>,
    ) -> StoreResult<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::Config("memory store lock poisoned".to_string()))?;
        objects.insert((zone, path.to_string()), StoredObject { data, metadata });
        Ok(())
    }

    async fn get(&self, zone: Zone, path: &str) -> StoreResult<Vec<u8>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::Config("memory store lock poisoned".to_string()))?;
        objects
            .get(&(zone, path.to_string()))
            .map(|o| o.data.clone())
            .ok_or_else(|| StoreError::ObjectNotFound {
                zone,
                path: path.to_string(),
            })
    }

    async fn list(&self, zone: Zone) -> StoreResult<Vec<String>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| StoreError::Config("memory store lock poisoned".to_string()))?;
        let mut keys: Vec<String> = objects
            .keys()
            .filter(|(z, _)| *z == zone)
            .map(|(_, p)| p.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_list_roundtrip() {
        let store = MemoryStore::new();
        let mut meta = BTreeMap::new();
        meta.insert("description".to_string(), "raw extract".to_string());

        store
            .put(Zone::Raw, "trafico/trafico-horario.csv", b"a,b\n1,2\n".to_vec(), meta)
            .await
            .unwrap();

        let bytes = store.get(Zone::Raw, "trafico/trafico-horario.csv").await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");

        assert_eq!(
            store.list(Zone::Raw).await.unwrap(),
            vec!["trafico/trafico-horario.csv".to_string()]
        );
        assert!(store.list(Zone::Process).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get(Zone::Raw, "nope.csv").await.unwrap_err();
        assert!(matches!(err, StoreError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn put_overwrites_per_path() {
        let store = MemoryStore::new();
        store
            .put(Zone::Process, "a.parquet", vec![1], BTreeMap::new())
            .await
            .unwrap();
        store
            .put(Zone::Process, "a.parquet", vec![2], BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(store.get(Zone::Process, "a.parquet").await.unwrap(), vec![2]);
        assert_eq!(store.list(Zone::Process).await.unwrap().len(), 1);
    }
}
