//! Cache lookup status.

use serde::{Deserialize, Serialize};

/// Status of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Fresh cache hit.
    Hit,
    /// Cache miss.
    Miss,
    /// Stale hit (served while revalidating).
    Stale,
    /// Bypass - caching not applicable.
    Bypass,
    /// Error during cache operation.
    Error,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Stale => write!(f, "STALE"),
            Self::Bypass => write!(f, "BYPASS"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}
