//! Core abstractions for the offline fetch-cache engine.
//!
//! This crate provides the fundamental types:
//! - `FetchRequest` / `FetchResponse` - Host-agnostic fetch model
//! - `Headers` - Case-insensitive header map
//! - `Clock` - Injectable time source for TTL math
//! - `CacheStatus` - Result of a cache lookup
//! - `RequestId` - Unique request identifier for log correlation

mod clock;
mod request;
mod response;
mod status;

pub use clock::*;
pub use request::*;
pub use response::*;
pub use status::*;

// Re-export the http types used throughout the fetch model
pub use http::{Method, StatusCode};
