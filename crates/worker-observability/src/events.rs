//! Structured events emitted by the cache policy layer.

use serde::Serialize;
use worker_core::CacheStatus;

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
        }
    }
}

/// A structured event from the cache policy layer.
///
/// Cache-write failures never surface as errors to the caller; they are
/// reported here instead so they remain diagnosable.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    /// A request was classified and served by a strategy.
    Lookup {
        /// Strategy that handled the request.
        strategy: String,
        /// Bucket consulted, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        bucket: Option<String>,
        /// Request URL.
        url: String,
        /// Lookup outcome.
        status: CacheStatus,
        /// Request ID for correlation.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    /// A cache write failed and was swallowed.
    WriteFailed {
        bucket: String,
        url: String,
        reason: String,
    },
    /// A cache write was deliberately skipped (entry cap, excluded host).
    WriteSkipped {
        bucket: String,
        url: String,
        reason: String,
    },
    /// A pre-cache asset could not be fetched or stored during install.
    PrecacheFailed { asset: String, reason: String },
    /// A stale-version bucket was deleted during activation.
    BucketDeleted { bucket: String },
    /// The janitor finished a sweep.
    SweepCompleted {
        bucket: String,
        scanned: usize,
        removed: usize,
    },
    /// The worker lifecycle moved to a new phase.
    PhaseChanged { phase: String },
}

impl CacheEvent {
    /// Severity of this event.
    pub fn level(&self) -> EventLevel {
        match self {
            Self::Lookup { .. } => EventLevel::Debug,
            Self::WriteFailed { .. } | Self::PrecacheFailed { .. } => EventLevel::Warn,
            _ => EventLevel::Info,
        }
    }

    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_human())
    }

    /// Format as human-readable string.
    pub fn to_human(&self) -> String {
        match self {
            Self::Lookup {
                strategy,
                bucket,
                url,
                status,
                request_id,
            } => {
                let mut s = format!("[{}] {} {}", status, strategy, url);
                if let Some(bucket) = bucket {
                    s.push_str(&format!(" bucket={}", bucket));
                }
                if let Some(id) = request_id {
                    s.push_str(&format!(" request_id={}", id));
                }
                s
            }
            Self::WriteFailed {
                bucket,
                url,
                reason,
            } => format!("cache write failed bucket={} url={} reason={}", bucket, url, reason),
            Self::WriteSkipped {
                bucket,
                url,
                reason,
            } => format!("cache write skipped bucket={} url={} reason={}", bucket, url, reason),
            Self::PrecacheFailed { asset, reason } => {
                format!("precache failed asset={} reason={}", asset, reason)
            }
            Self::BucketDeleted { bucket } => format!("deleted stale bucket {}", bucket),
            Self::SweepCompleted {
                bucket,
                scanned,
                removed,
            } => format!("sweep of {} scanned={} removed={}", bucket, scanned, removed),
            Self::PhaseChanged { phase } => format!("phase -> {}", phase),
        }
    }
}
