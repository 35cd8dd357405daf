//! Worker lifecycle: install-time pre-warm and activate-time bucket sweep.

use worker_core::FetchRequest;
use worker_observability::CacheEvent;

use crate::engine::FetchCache;
use crate::network::NetworkBackend;
use crate::store::CacheStore;

/// Lifecycle phases of the worker.
///
/// `Installing -> Installed -> Activating -> Activated`. The engine skips
/// the wait-for-old-instance step: `install` transitions straight to
/// `Installed`, and `activate` takes control immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Pre-warming the static bucket.
    Installing,
    /// Install finished (skip-waiting applied).
    Installed,
    /// Sweeping stale-version buckets.
    Activating,
    /// In control of all requests.
    Activated,
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
        }
    }
}

/// Outcome of the install pre-warm.
#[derive(Debug, Clone, Default)]
pub struct PrecacheReport {
    /// Assets stored in the static bucket.
    pub cached: Vec<String>,
    /// Assets that failed to fetch or store.
    pub failed: Vec<String>,
}

impl PrecacheReport {
    /// Whether every manifest asset was cached.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of the activation sweep.
#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
    /// Buckets matching a current version name.
    pub retained: Vec<String>,
    /// Stale-version buckets deleted.
    pub deleted: Vec<String>,
}

impl<S, N> FetchCache<S, N>
where
    S: CacheStore + 'static,
    N: NetworkBackend + 'static,
{
    /// Current lifecycle phase.
    pub fn phase(&self) -> WorkerPhase {
        *self.phase.lock().expect("phase poisoned")
    }

    fn set_phase(&self, phase: WorkerPhase) {
        *self.phase.lock().expect("phase poisoned") = phase;
        self.sink.record(CacheEvent::PhaseChanged {
            phase: phase.to_string(),
        });
    }

    /// Pre-warm the static bucket from the asset manifest.
    ///
    /// Each asset is fetched and stored independently; a single failure
    /// never aborts the rest. Ends in `Installed` regardless of how many
    /// assets failed.
    pub async fn install(&self) -> PrecacheReport {
        self.set_phase(WorkerPhase::Installing);
        let mut report = PrecacheReport::default();

        for asset in &self.config.precache_assets {
            let request = FetchRequest::get(asset);
            let outcome = match self.network.fetch(&request).await {
                Ok(response) if response.is_cacheable() => self
                    .store
                    .put(&self.config.static_bucket, &request.cache_key(), response)
                    .await
                    .map_err(|e| e.to_string()),
                Ok(response) => Err(format!("uncacheable status {}", response.status)),
                Err(err) => Err(err.to_string()),
            };

            match outcome {
                Ok(()) => report.cached.push(asset.clone()),
                Err(reason) => {
                    self.sink.record(CacheEvent::PrecacheFailed {
                        asset: asset.clone(),
                        reason,
                    });
                    report.failed.push(asset.clone());
                }
            }
        }

        self.set_phase(WorkerPhase::Installed);
        report
    }

    /// Delete every bucket whose name is not a current versioned name,
    /// then take control.
    pub async fn activate(&self) -> ActivationReport {
        self.set_phase(WorkerPhase::Activating);
        let current = self.config.current_buckets();
        let mut report = ActivationReport::default();

        if let Ok(names) = self.store.bucket_names().await {
            for name in names {
                if current.contains(&name.as_str()) {
                    report.retained.push(name);
                } else if self.store.delete_bucket(&name).await.unwrap_or(false) {
                    self.sink.record(CacheEvent::BucketDeleted {
                        bucket: name.clone(),
                    });
                    report.deleted.push(name);
                }
            }
        }

        self.set_phase(WorkerPhase::Activated);
        report
    }
}
