//! In-memory blob store with per-key reader ACLs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{BlobStore, BlobStream, Subject};
use crate::error::BlobStoreError;

struct StoredBlob {
    data: Bytes,
    /// Principals allowed to read; `None` means anyone.
    readers: Option<BTreeSet<String>>,
}

/// In-memory blob store.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
    reads: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob readable by anyone.
    pub async fn put(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.blobs.write().await.insert(
            key.into(),
            StoredBlob {
                data: data.into(),
                readers: None,
            },
        );
    }

    /// Store a blob readable only by the given principals.
    pub async fn put_restricted<I, S>(&self, key: impl Into<String>, data: impl Into<Bytes>, readers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blobs.write().await.insert(
            key.into(),
            StoredBlob {
                data: data.into(),
                readers: Some(readers.into_iter().map(Into::into).collect()),
            },
        );
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.blobs.write().await.remove(key).is_some()
    }

    /// Number of `get_blob` calls served so far, including failed ones.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list_keys(&self) -> Result<Vec<String>, BlobStoreError> {
        Ok(self.blobs.read().await.keys().cloned().collect())
    }

    async fn get_blob(&self, key: &str, subject: &Subject) -> Result<BlobStream, BlobStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let blobs = self.blobs.read().await;
        let blob = blobs
            .get(key)
            .ok_or_else(|| BlobStoreError::KeyNotFound(key.to_string()))?;

        if let Some(readers) = &blob.readers {
            if !readers.contains(&subject.principal) {
                return Err(BlobStoreError::Authorization {
                    principal: subject.principal.clone(),
                    key: key.to_string(),
                });
            }
        }

        Ok(BlobStream::from_bytes(blob.data.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_list_get() {
        let store = MemoryBlobStore::new();
        store.put("b", "two").await;
        store.put("a", "one").await;

        assert_eq!(store.list_keys().await.unwrap(), vec!["a", "b"]);
        let content = store
            .get_blob("a", &Subject::new("nimbus"))
            .await
            .unwrap()
            .read_fully()
            .await
            .unwrap();
        assert_eq!(content, b"one");
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryBlobStore::new();
        let err = store.get_blob("x", &Subject::new("nimbus")).await.unwrap_err();
        assert!(matches!(err, BlobStoreError::KeyNotFound(k) if k == "x"));
    }

    #[tokio::test]
    async fn test_restricted_blob() {
        let store = MemoryBlobStore::new();
        store.put_restricted("secret", "data", ["alice"]).await;

        assert!(store.get_blob("secret", &Subject::new("alice")).await.is_ok());
        let err = store
            .get_blob("secret", &Subject::new("mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobStoreError::Authorization { .. }));
    }
}
