//! Periodic age-based sweep of the API bucket.

use std::sync::Arc;
use std::time::Duration;

use worker_core::Clock;
use worker_observability::{CacheEvent, EventSink};

use crate::config::CachePolicyConfig;
use crate::engine::FetchCache;
use crate::network::NetworkBackend;
use crate::store::CacheStore;

/// Result of a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries examined.
    pub scanned: usize,
    /// Entries deleted.
    pub removed: usize,
}

/// Sweeps aged entries out of the API bucket.
///
/// A coarse, unconditional age sweep, not LRU: every entry older than the
/// max age is deleted, nothing else is touched. Entries with a missing or
/// garbled timestamp are skipped and the sweep continues.
pub struct Janitor<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    bucket: String,
    max_age: Duration,
    interval: Duration,
}

impl<S: CacheStore + 'static> Janitor<S> {
    /// Create a janitor for the API bucket of the given configuration.
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        config: &CachePolicyConfig,
    ) -> Self {
        Self {
            store,
            clock,
            sink,
            bucket: config.api_bucket.clone(),
            max_age: config.sweep_max_age,
            interval: config.sweep_interval,
        }
    }

    /// Run one sweep.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let keys = match self.store.keys(&self.bucket).await {
            Ok(keys) => keys,
            Err(_) => return report,
        };

        let now = self.clock.now_millis();
        let max_age_millis = self.max_age.as_millis() as u64;

        for key in keys {
            report.scanned += 1;
            let entry = match self.store.lookup(&self.bucket, &key).await {
                Ok(Some(entry)) => entry,
                _ => continue,
            };
            let expired = entry
                .age_millis(now)
                .map(|age| age > max_age_millis)
                .unwrap_or(false);
            if expired && self.store.delete(&self.bucket, &key).await.unwrap_or(false) {
                report.removed += 1;
            }
        }

        self.sink.record(CacheEvent::SweepCompleted {
            bucket: self.bucket.clone(),
            scanned: report.scanned,
            removed: report.removed,
        });
        report
    }

    /// Run sweeps on the configured interval until the handle is aborted.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }
}

impl<S, N> FetchCache<S, N>
where
    S: CacheStore + 'static,
    N: NetworkBackend + 'static,
{
    /// Create a janitor sharing this engine's store, clock, and sink.
    pub fn janitor(&self) -> Janitor<S> {
        Janitor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&self.sink),
            &self.config,
        )
    }
}
