//! Observability infrastructure for the offline fetch-cache engine.
//!
//! This crate provides:
//! - `CacheEvent` - Structured events emitted by the policy layer
//! - `EventSink` - Injected sink trait for recording events
//! - `TracingSink` - Default sink emitting through `tracing`
//! - `MemorySink` - Capturing sink for tests

mod events;
mod sink;

pub use events::*;
pub use sink::*;

// Re-export CacheStatus from worker-core for convenience
pub use worker_core::CacheStatus;
