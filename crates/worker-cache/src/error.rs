//! Cache error types.

use thiserror::Error;

/// Errors from a cache store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open a bucket.
    #[error("failed to open bucket: {0}")]
    OpenFailed(String),

    /// Backend operation failed.
    #[error("store operation failed: {0}")]
    Backend(String),
}

/// Errors from the network backend.
///
/// The engine maps these to degraded responses on every path except
/// bypass and an uncached stale-while-revalidate lookup, where they
/// propagate to the caller.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The network is unreachable or the fetch failed outright.
    #[error("network unreachable: {0}")]
    Unreachable(String),
}
