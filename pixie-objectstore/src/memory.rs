use bytes::Bytes;
use dashmap::DashMap;

use crate::{ObjectStore, ObjectStoreError};

/// Not reachable in production wiring — backs the orchestrator and
/// thumbnail-worker tests without a real S3-compatible endpoint.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, (Bytes, String)>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ObjectStoreError> {
        self.objects.insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<(Bytes, String), ObjectStoreError> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.objects.contains_key(key))
    }

    async fn ensure_bucket(&self) -> Result<(), ObjectStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryObjectStore::new();
        store.put("photos/a.jpg", Bytes::from_static(b"data"), "image/jpeg").await.unwrap();

        let (bytes, content_type) = store.get("photos/a.jpg").await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"data"));
        assert_eq!(content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = MemoryObjectStore::new();
        assert_eq!(
            store.get("missing").await,
            Err(ObjectStoreError::NotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let store = MemoryObjectStore::new();
        store.put("k", Bytes::from_static(b"v1"), "text/plain").await.unwrap();
        store.put("k", Bytes::from_static(b"v2"), "text/plain").await.unwrap();
        let (bytes, _) = store.get("k").await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = MemoryObjectStore::new();
        store.put("k", Bytes::from_static(b"v"), "text/plain").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }
}
