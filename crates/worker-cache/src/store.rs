//! Named-bucket response storage.
//!
//! The in-process analogue of the browser Cache API: named buckets of
//! request-key to response entries. Entries are only ever written for
//! successful, non-partial GET responses; the engine enforces that
//! invariant before calling `put`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use worker_core::FetchResponse;

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Cache bucket storage backend.
///
/// Buckets are created on first write. Reading a bucket that does not
/// exist behaves as an empty bucket, not an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Names of all existing buckets.
    async fn bucket_names(&self) -> StoreResult<Vec<String>>;

    /// Delete a whole bucket. Returns whether it existed.
    async fn delete_bucket(&self, bucket: &str) -> StoreResult<bool>;

    /// Look up an entry.
    async fn lookup(&self, bucket: &str, key: &str) -> StoreResult<Option<FetchResponse>>;

    /// Store an entry, replacing any existing one.
    async fn put(&self, bucket: &str, key: &str, response: FetchResponse) -> StoreResult<()>;

    /// Delete an entry. Returns whether it existed.
    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<bool>;

    /// Keys of all entries in a bucket.
    async fn keys(&self, bucket: &str) -> StoreResult<Vec<String>>;

    /// Number of entries in a bucket.
    async fn len(&self, bucket: &str) -> StoreResult<usize>;
}

/// In-memory store backend.
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, HashMap<String, FetchResponse>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<String, HashMap<String, FetchResponse>>> {
        self.buckets.lock().expect("store poisoned")
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn bucket_names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.locked().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.locked().remove(bucket).is_some())
    }

    async fn lookup(&self, bucket: &str, key: &str) -> StoreResult<Option<FetchResponse>> {
        Ok(self
            .locked()
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned())
    }

    async fn put(&self, bucket: &str, key: &str, response: FetchResponse) -> StoreResult<()> {
        self.locked()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        Ok(self
            .locked()
            .get_mut(bucket)
            .map(|b| b.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn keys(&self, bucket: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .locked()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn len(&self, bucket: &str) -> StoreResult<usize> {
        Ok(self.locked().get(bucket).map(|b| b.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_bucket_reads_as_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.lookup("nope", "GET /x").await.unwrap(), None);
        assert_eq!(store.len("nope").await.unwrap(), 0);
        assert!(store.keys("nope").await.unwrap().is_empty());
        assert!(!store.delete("nope", "GET /x").await.unwrap());
        assert!(!store.delete_bucket("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_creates_bucket() {
        let store = MemoryStore::new();
        store
            .put("static-v1", "GET /index.html", FetchResponse::ok("<html>"))
            .await
            .unwrap();

        assert_eq!(store.bucket_names().await.unwrap(), vec!["static-v1"]);
        assert_eq!(store.len("static-v1").await.unwrap(), 1);
        let cached = store
            .lookup("static-v1", "GET /index.html")
            .await
            .unwrap()
            .expect("entry present");
        assert_eq!(cached.body_text(), "<html>");
    }

    #[tokio::test]
    async fn test_put_replaces_entry() {
        let store = MemoryStore::new();
        store
            .put("api-v1", "GET /rest/v1/events", FetchResponse::ok("old"))
            .await
            .unwrap();
        store
            .put("api-v1", "GET /rest/v1/events", FetchResponse::ok("new"))
            .await
            .unwrap();

        assert_eq!(store.len("api-v1").await.unwrap(), 1);
        let cached = store
            .lookup("api-v1", "GET /rest/v1/events")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.body_text(), "new");
    }

    #[tokio::test]
    async fn test_delete_bucket() {
        let store = MemoryStore::new();
        store
            .put("old-v0", "GET /a", FetchResponse::ok("a"))
            .await
            .unwrap();
        assert!(store.delete_bucket("old-v0").await.unwrap());
        assert!(store.bucket_names().await.unwrap().is_empty());
    }
}
