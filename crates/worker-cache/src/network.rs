//! Network backend trait.

use async_trait::async_trait;
use worker_core::{FetchRequest, FetchResponse};

use crate::error::NetworkError;

/// The engine's source of real responses.
///
/// There is no retry and no engine-imposed timeout; the backend's own
/// bounds are the only ones (the caller's reload is the recovery path).
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Perform the fetch.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError>;

    /// Perform the fetch bypassing any intermediate HTTP cache, so a
    /// navigation always sees the current document. Backends without an
    /// HTTP cache of their own can keep the default.
    async fn fetch_no_cache(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        self.fetch(request).await
    }
}
