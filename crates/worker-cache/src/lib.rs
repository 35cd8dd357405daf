//! Offline-first fetch caching for the worker engine.
//!
//! This crate provides the cache policy layer a service worker implements
//! in a browser, as a host-agnostic library:
//! - `CachePolicyConfig` - Bucket versions, manifests, and tunables
//! - `CacheStore` / `MemoryStore` - Named-bucket response storage
//! - `Dispatcher` - First-match classification of requests to strategies
//! - `FetchCache` - The engine running the five caching strategies
//! - `Janitor` - Periodic age-based sweep of the API bucket
//!
//! # Example
//!
//! ```ignore
//! use worker_cache::{CachePolicyConfig, FetchCache, MemoryStore};
//! use worker_core::FetchRequest;
//!
//! let cache = FetchCache::new(CachePolicyConfig::default(), MemoryStore::new(), network);
//! cache.install().await;
//! cache.activate().await;
//!
//! let response = cache.handle(&FetchRequest::get("/rest/v1/events")).await?;
//! ```

mod config;
mod dispatch;
mod engine;
mod error;
mod janitor;
mod lifecycle;
mod network;
mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::*;
pub use dispatch::*;
pub use engine::*;
pub use error::*;
pub use janitor::*;
pub use lifecycle::*;
pub use network::*;
pub use store::*;
