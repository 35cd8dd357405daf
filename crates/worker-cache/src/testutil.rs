//! Test doubles shared across the crate's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use worker_core::{FetchRequest, FetchResponse};

use crate::error::{NetworkError, StoreError};
use crate::network::NetworkBackend;
use crate::store::{CacheStore, StoreResult};

/// Scriptable network backend that counts fetches and can go offline.
#[derive(Default)]
pub(crate) struct StubNetwork {
    responses: Mutex<HashMap<String, FetchResponse>>,
    offline: AtomicBool,
    fetch_calls: AtomicUsize,
    no_cache_calls: AtomicUsize,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response for a URL. Unknown URLs get a plain 200 "ok".
    pub fn respond(&self, url: impl Into<String>, response: FetchResponse) {
        self.responses
            .lock()
            .expect("stub poisoned")
            .insert(url.into(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total fetches, including cache-bypassing ones.
    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Cache-bypassing fetches only.
    pub fn no_cache_count(&self) -> usize {
        self.no_cache_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkBackend for StubNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unreachable("stub offline".to_string()));
        }
        Ok(self
            .responses
            .lock()
            .expect("stub poisoned")
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::ok("ok")))
    }

    async fn fetch_no_cache(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        self.no_cache_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch(request).await
    }
}

/// Store whose writes always fail; reads behave as an empty store.
#[derive(Default)]
pub(crate) struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn bucket_names(&self) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn delete_bucket(&self, _bucket: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn lookup(&self, _bucket: &str, _key: &str) -> StoreResult<Option<FetchResponse>> {
        Ok(None)
    }

    async fn put(&self, _bucket: &str, _key: &str, _response: FetchResponse) -> StoreResult<()> {
        Err(StoreError::Backend("disk full".to_string()))
    }

    async fn delete(&self, _bucket: &str, _key: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn keys(&self, _bucket: &str) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn len(&self, _bucket: &str) -> StoreResult<usize> {
        Ok(0)
    }
}
