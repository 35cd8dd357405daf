//! The fetch-cache engine and its strategy implementations.
//!
//! `FetchCache` classifies each request through the dispatcher and runs
//! exactly one strategy against the store and network backends. Store
//! failures never fail the caller-visible response; they are reported
//! through the event sink and the strategy continues with a fallback.

use std::sync::{Arc, Mutex};

use worker_core::{CacheStatus, Clock, FetchRequest, FetchResponse, RequestId, SystemClock};
use worker_observability::{CacheEvent, EventSink, TracingSink};

use crate::config::CachePolicyConfig;
use crate::dispatch::{Dispatcher, StrategyKind};
use crate::error::NetworkError;
use crate::lifecycle::WorkerPhase;
use crate::network::NetworkBackend;
use crate::store::CacheStore;

/// The cache policy engine.
///
/// Single-instance, event-driven: concurrent `handle` calls may race to
/// populate the same entry, which is tolerated (last write wins; entries
/// are idempotent re-derivations of the same resource).
pub struct FetchCache<S, N> {
    pub(crate) config: CachePolicyConfig,
    pub(crate) store: Arc<S>,
    pub(crate) network: Arc<N>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) phase: Mutex<WorkerPhase>,
}

impl<S, N> FetchCache<S, N>
where
    S: CacheStore + 'static,
    N: NetworkBackend + 'static,
{
    /// Create an engine with the system clock and the tracing sink.
    pub fn new(config: CachePolicyConfig, store: S, network: N) -> Self {
        let dispatcher = Dispatcher::from_config(&config);
        Self {
            config,
            store: Arc::new(store),
            network: Arc::new(network),
            clock: Arc::new(SystemClock),
            sink: Arc::new(TracingSink),
            dispatcher,
            phase: Mutex::new(WorkerPhase::Installing),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the event sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &CachePolicyConfig {
        &self.config
    }

    /// Classify a request without executing it.
    pub fn classify(&self, request: &FetchRequest) -> StrategyKind {
        self.dispatcher.classify(request)
    }

    /// Handle a fetch request.
    ///
    /// An error escapes only on the bypass path and on a
    /// stale-while-revalidate lookup with no cached entry; every other
    /// strategy degrades to a synthetic response.
    pub async fn handle(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        let request_id = RequestId::generate();
        match self.dispatcher.classify(request) {
            StrategyKind::Bypass => {
                self.record(StrategyKind::Bypass, None, request, CacheStatus::Bypass, &request_id);
                self.network.fetch(request).await
            }
            StrategyKind::CacheFirst => Ok(self.cache_first(request, &request_id).await),
            StrategyKind::CacheFirstImage => Ok(self.cache_first_image(request, &request_id).await),
            StrategyKind::NetworkFirstTtl => Ok(self.network_first_ttl(request, &request_id).await),
            StrategyKind::NetworkFirstNavigation => {
                Ok(self.network_first_navigation(request, &request_id).await)
            }
            StrategyKind::StaleWhileRevalidate => {
                self.stale_while_revalidate(request, &request_id).await
            }
        }
    }

    /// Cache-first: a hit short-circuits the network entirely.
    async fn cache_first(&self, request: &FetchRequest, request_id: &RequestId) -> FetchResponse {
        let bucket = self.config.static_bucket.clone();
        let key = request.cache_key();

        if let Ok(Some(cached)) = self.store.lookup(&bucket, &key).await {
            self.record(StrategyKind::CacheFirst, Some(&bucket), request, CacheStatus::Hit, request_id);
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() && !request.has_range_header() {
                    self.put_swallowing(&bucket, &key, response.clone(), &request.url).await;
                }
                self.record(StrategyKind::CacheFirst, Some(&bucket), request, CacheStatus::Miss, request_id);
                response
            }
            Err(_) => {
                self.record(StrategyKind::CacheFirst, Some(&bucket), request, CacheStatus::Error, request_id);
                FetchResponse::offline_503()
            }
        }
    }

    /// Cache-first for images: storage is capped (no eviction, just
    /// refusal to add more) and total failure degrades to a placeholder.
    async fn cache_first_image(
        &self,
        request: &FetchRequest,
        request_id: &RequestId,
    ) -> FetchResponse {
        let bucket = self.config.image_bucket.clone();
        let key = request.cache_key();

        if let Ok(Some(cached)) = self.store.lookup(&bucket, &key).await {
            self.record(StrategyKind::CacheFirstImage, Some(&bucket), request, CacheStatus::Hit, request_id);
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() && !request.has_range_header() {
                    let under_cap = self
                        .store
                        .len(&bucket)
                        .await
                        .map(|n| n < self.config.image_entry_cap)
                        .unwrap_or(false);
                    if under_cap {
                        self.put_swallowing(&bucket, &key, response.clone(), &request.url).await;
                    } else {
                        self.sink.record(CacheEvent::WriteSkipped {
                            bucket: bucket.clone(),
                            url: request.url.clone(),
                            reason: "image bucket at capacity".to_string(),
                        });
                    }
                }
                self.record(StrategyKind::CacheFirstImage, Some(&bucket), request, CacheStatus::Miss, request_id);
                response
            }
            Err(_) => {
                self.record(StrategyKind::CacheFirstImage, Some(&bucket), request, CacheStatus::Error, request_id);
                FetchResponse::placeholder_image()
            }
        }
    }

    /// Network-first for API requests: successful responses are stamped
    /// and stored; the cached fallback is served only within the TTL.
    async fn network_first_ttl(
        &self,
        request: &FetchRequest,
        request_id: &RequestId,
    ) -> FetchResponse {
        let bucket = self.config.api_bucket.clone();
        let key = request.cache_key();

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    let stamped = response.clone().with_cached_at(self.clock.now_millis());
                    self.put_swallowing(&bucket, &key, stamped, &request.url).await;
                }
                self.record(StrategyKind::NetworkFirstTtl, Some(&bucket), request, CacheStatus::Miss, request_id);
                response
            }
            Err(_) => {
                if let Ok(Some(cached)) = self.store.lookup(&bucket, &key).await {
                    let ttl_millis = self.config.api_ttl.as_millis() as u64;
                    let stale = cached
                        .age_millis(self.clock.now_millis())
                        .map(|age| age > ttl_millis)
                        .unwrap_or(false);
                    if !stale {
                        self.record(StrategyKind::NetworkFirstTtl, Some(&bucket), request, CacheStatus::Hit, request_id);
                        return cached;
                    }
                }
                self.record(StrategyKind::NetworkFirstTtl, Some(&bucket), request, CacheStatus::Error, request_id);
                FetchResponse::offline_503()
            }
        }
    }

    /// Navigation always goes to the network with cache-bypass semantics,
    /// so the document shell references current hashed assets. Only a
    /// network failure falls back to the pinned offline document.
    async fn network_first_navigation(
        &self,
        request: &FetchRequest,
        request_id: &RequestId,
    ) -> FetchResponse {
        match self.network.fetch_no_cache(request).await {
            Ok(response) => {
                self.record(StrategyKind::NetworkFirstNavigation, None, request, CacheStatus::Miss, request_id);
                response
            }
            Err(_) => {
                let bucket = self.config.static_bucket.clone();
                let offline_key = FetchRequest::get(&self.config.offline_document).cache_key();
                if let Ok(Some(cached)) = self.store.lookup(&bucket, &offline_key).await {
                    self.record(StrategyKind::NetworkFirstNavigation, Some(&bucket), request, CacheStatus::Hit, request_id);
                    return cached;
                }
                self.record(StrategyKind::NetworkFirstNavigation, Some(&bucket), request, CacheStatus::Error, request_id);
                FetchResponse::offline_503()
            }
        }
    }

    /// Stale-while-revalidate: a cached entry is returned immediately and
    /// refreshed in the background; with nothing cached the caller waits
    /// on the network and a failure propagates.
    async fn stale_while_revalidate(
        &self,
        request: &FetchRequest,
        request_id: &RequestId,
    ) -> Result<FetchResponse, NetworkError> {
        let bucket = self.config.generic_bucket.clone();
        let key = request.cache_key();
        let never_store = self.config.is_never_cache_url(&request.url);

        let cached = self.store.lookup(&bucket, &key).await.unwrap_or(None);

        if let Some(cached) = cached {
            let store = Arc::clone(&self.store);
            let network = Arc::clone(&self.network);
            let sink = Arc::clone(&self.sink);
            let refresh_request = request.clone();
            let refresh_bucket = bucket.clone();
            let refresh_key = key.clone();
            tokio::spawn(async move {
                // Refresh errors are swallowed; the caller already has a
                // response.
                if let Ok(response) = network.fetch(&refresh_request).await {
                    store_refresh(
                        store.as_ref(),
                        sink.as_ref(),
                        &refresh_bucket,
                        &refresh_key,
                        &refresh_request,
                        response,
                        never_store,
                    )
                    .await;
                }
            });

            self.record(StrategyKind::StaleWhileRevalidate, Some(&bucket), request, CacheStatus::Stale, request_id);
            return Ok(cached);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                store_refresh(
                    self.store.as_ref(),
                    self.sink.as_ref(),
                    &bucket,
                    &key,
                    request,
                    response.clone(),
                    never_store,
                )
                .await;
                self.record(StrategyKind::StaleWhileRevalidate, Some(&bucket), request, CacheStatus::Miss, request_id);
                Ok(response)
            }
            Err(err) => {
                self.record(StrategyKind::StaleWhileRevalidate, Some(&bucket), request, CacheStatus::Error, request_id);
                Err(err)
            }
        }
    }

    /// Store an entry, converting failure into a sink event.
    pub(crate) async fn put_swallowing(
        &self,
        bucket: &str,
        key: &str,
        response: FetchResponse,
        url: &str,
    ) {
        if let Err(err) = self.store.put(bucket, key, response).await {
            self.sink.record(CacheEvent::WriteFailed {
                bucket: bucket.to_string(),
                url: url.to_string(),
                reason: err.to_string(),
            });
        }
    }

    fn record(
        &self,
        strategy: StrategyKind,
        bucket: Option<&str>,
        request: &FetchRequest,
        status: CacheStatus,
        request_id: &RequestId,
    ) {
        self.sink.record(CacheEvent::Lookup {
            strategy: strategy.as_str().to_string(),
            bucket: bucket.map(String::from),
            url: request.url.clone(),
            status,
            request_id: Some(request_id.to_string()),
        });
    }
}

/// Shared revalidation write path for stale-while-revalidate, used both
/// inline and from the spawned refresh task.
async fn store_refresh<S: CacheStore + ?Sized>(
    store: &S,
    sink: &dyn EventSink,
    bucket: &str,
    key: &str,
    request: &FetchRequest,
    response: FetchResponse,
    never_store: bool,
) {
    if !response.is_cacheable() || request.has_range_header() {
        return;
    }
    if never_store {
        sink.record(CacheEvent::WriteSkipped {
            bucket: bucket.to_string(),
            url: request.url.clone(),
            reason: "never-cache url".to_string(),
        });
        return;
    }
    if let Err(err) = store.put(bucket, key, response).await {
        sink.record(CacheEvent::WriteFailed {
            bucket: bucket.to_string(),
            url: request.url.clone(),
            reason: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use worker_core::{Destination, ManualClock, Method, RequestMode, StatusCode};
    use worker_observability::MemorySink;

    use crate::store::MemoryStore;
    use crate::testutil::{FailingStore, StubNetwork};

    struct Harness {
        cache: FetchCache<MemoryStore, StubNetwork>,
        clock: Arc<ManualClock>,
        sink: Arc<MemorySink>,
    }

    fn harness() -> Harness {
        harness_with(CachePolicyConfig::default())
    }

    fn harness_with(config: CachePolicyConfig) -> Harness {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let sink = Arc::new(MemorySink::new());
        let cache = FetchCache::new(config, MemoryStore::new(), StubNetwork::new())
            .with_clock(clock.clone())
            .with_sink(sink.clone());
        Harness { cache, clock, sink }
    }

    /// Let spawned background refreshes run on the current-thread runtime.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_cache_first_hit_short_circuits_network() {
        let h = harness();
        h.cache.network.respond("/manifest.json", FetchResponse::ok("{}"));
        let request = FetchRequest::get("/manifest.json");

        let first = h.cache.handle(&request).await.unwrap();
        assert_eq!(first.body_text(), "{}");
        assert_eq!(h.cache.network.fetch_count(), 1);

        let second = h.cache.handle(&request).await.unwrap();
        assert_eq!(second.body_text(), "{}");
        // Cache hit: no second network call.
        assert_eq!(h.cache.network.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_offline_without_entry_degrades() {
        let h = harness();
        h.cache.network.set_offline(true);

        let response = h.cache.handle(&FetchRequest::get("/manifest.json")).await.unwrap();
        assert_eq!(response.status.as_u16(), 503);
        assert_eq!(response.body_text(), "Offline");
    }

    #[tokio::test]
    async fn test_range_requests_are_not_stored() {
        let h = harness();
        let request = FetchRequest::get("/manifest.json").with_header("Range", "bytes=0-99");

        h.cache.handle(&request).await.unwrap();
        assert_eq!(h.cache.store.len("static-v1").await.unwrap(), 0);

        h.cache.handle(&request).await.unwrap();
        assert_eq!(h.cache.network.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_image_bucket_plateaus_at_cap() {
        let h = harness_with(CachePolicyConfig::default().with_image_entry_cap(3));

        for i in 0..4 {
            let request = FetchRequest::get(format!("/photos/{}.jpg", i))
                .with_destination(Destination::Image);
            h.cache.handle(&request).await.unwrap();
        }

        assert_eq!(h.cache.store.len("images-v1").await.unwrap(), 3);
        assert!(h.sink.events().iter().any(|e| matches!(
            e,
            CacheEvent::WriteSkipped { reason, .. } if reason == "image bucket at capacity"
        )));

        // The refused entry stays a miss: the next request fetches again.
        let before = h.cache.network.fetch_count();
        h.cache
            .handle(&FetchRequest::get("/photos/3.jpg").with_destination(Destination::Image))
            .await
            .unwrap();
        assert_eq!(h.cache.network.fetch_count(), before + 1);
    }

    #[tokio::test]
    async fn test_image_failure_returns_placeholder() {
        let h = harness();
        h.cache.network.set_offline(true);

        let response = h.cache
            .handle(&FetchRequest::get("/photos/venue.jpg").with_destination(Destination::Image))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.headers.get("content-type"), Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn test_api_response_stamped_and_stored() {
        let h = harness();
        h.cache.network.respond("/rest/v1/events", FetchResponse::ok("[]"));

        let response = h.cache.handle(&FetchRequest::get("/rest/v1/events")).await.unwrap();
        assert_eq!(response.body_text(), "[]");
        // The caller gets the unstamped network response.
        assert_eq!(response.cached_at_millis(), None);

        let stored = h.cache
            .store
            .lookup("api-v1", "GET /rest/v1/events")
            .await
            .unwrap()
            .expect("stored");
        assert_eq!(stored.cached_at_millis(), Some(1_000_000));
    }

    #[tokio::test]
    async fn test_api_error_response_not_stored() {
        let h = harness();
        h.cache.network.respond(
            "/rest/v1/events",
            FetchResponse::new(StatusCode::INTERNAL_SERVER_ERROR),
        );

        let response = h.cache.handle(&FetchRequest::get("/rest/v1/events")).await.unwrap();
        assert_eq!(response.status.as_u16(), 500);
        assert_eq!(h.cache.store.len("api-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_api_ttl_boundary() {
        let h = harness();
        h.cache.network.respond("/rest/v1/events", FetchResponse::ok("payload"));
        let request = FetchRequest::get("/rest/v1/events");

        h.cache.handle(&request).await.unwrap();
        h.cache.network.set_offline(true);

        // Exactly at the TTL the entry is still servable.
        h.clock.advance(5 * 60 * 1000);
        let at_ttl = h.cache.handle(&request).await.unwrap();
        assert_eq!(at_ttl.body_text(), "payload");

        // One millisecond past it is not.
        h.clock.advance(1);
        let past_ttl = h.cache.handle(&request).await.unwrap();
        assert_eq!(past_ttl.status.as_u16(), 503);
        assert_eq!(past_ttl.body_text(), "Offline");
    }

    #[tokio::test]
    async fn test_api_stale_after_six_minutes_offline() {
        let h = harness();
        h.cache.network.respond("/rest/v1/events", FetchResponse::ok("payload"));
        let request = FetchRequest::get("/rest/v1/events");

        h.cache.handle(&request).await.unwrap();

        h.clock.advance(6 * 60 * 1000);
        h.cache.network.set_offline(true);
        let response = h.cache.handle(&request).await.unwrap();
        assert_eq!(response.status.as_u16(), 503);
    }

    #[tokio::test]
    async fn test_navigation_always_attempts_network() {
        let h = harness();
        h.cache
            .store
            .put("static-v1", "GET /index.html", FetchResponse::ok("offline shell"))
            .await
            .unwrap();
        h.cache.network.respond("/events", FetchResponse::ok("fresh html"));
        let request = FetchRequest::get("/events").with_mode(RequestMode::Navigate);

        let first = h.cache.handle(&request).await.unwrap();
        assert_eq!(first.body_text(), "fresh html");
        let second = h.cache.handle(&request).await.unwrap();
        assert_eq!(second.body_text(), "fresh html");
        // Both went to the network with cache-bypass semantics.
        assert_eq!(h.cache.network.no_cache_count(), 2);

        h.cache.network.set_offline(true);
        let offline = h.cache.handle(&request).await.unwrap();
        assert_eq!(offline.body_text(), "offline shell");
    }

    #[tokio::test]
    async fn test_navigation_offline_without_pinned_document() {
        let h = harness();
        h.cache.network.set_offline(true);

        let response = h.cache
            .handle(&FetchRequest::get("/events").with_mode(RequestMode::Navigate))
            .await
            .unwrap();
        assert_eq!(response.status.as_u16(), 503);
    }

    #[tokio::test]
    async fn test_offline_index_served_from_precache() {
        let h = harness();
        h.cache
            .network
            .respond("/index.html", FetchResponse::ok("<html>shell</html>"));
        h.cache.install().await;

        h.cache.network.set_offline(true);
        let response = h.cache.handle(&FetchRequest::get("/index.html")).await.unwrap();
        assert_eq!(response.body_text(), "<html>shell</html>");
    }

    #[tokio::test]
    async fn test_swr_serves_cached_and_refreshes() {
        let h = harness();
        let request = FetchRequest::get("/assets/app.js");
        h.cache.network.respond("/assets/app.js", FetchResponse::ok("v1"));

        let first = h.cache.handle(&request).await.unwrap();
        assert_eq!(first.body_text(), "v1");

        h.cache.network.respond("/assets/app.js", FetchResponse::ok("v2"));
        let second = h.cache.handle(&request).await.unwrap();
        // The stale copy is returned immediately.
        assert_eq!(second.body_text(), "v1");

        settle().await;
        let stored = h.cache
            .store
            .lookup("app-cache-v1", "GET /assets/app.js")
            .await
            .unwrap()
            .expect("refreshed");
        assert_eq!(stored.body_text(), "v2");

        let third = h.cache.handle(&request).await.unwrap();
        assert_eq!(third.body_text(), "v2");
    }

    #[tokio::test]
    async fn test_swr_background_failure_is_swallowed() {
        let h = harness();
        let request = FetchRequest::get("/assets/app.js");
        h.cache.network.respond("/assets/app.js", FetchResponse::ok("v1"));
        h.cache.handle(&request).await.unwrap();

        h.cache.network.set_offline(true);
        let response = h.cache.handle(&request).await.unwrap();
        assert_eq!(response.body_text(), "v1");

        settle().await;
        // The failed refresh left the entry alone.
        let stored = h.cache
            .store
            .lookup("app-cache-v1", "GET /assets/app.js")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body_text(), "v1");
    }

    #[tokio::test]
    async fn test_swr_uncached_offline_propagates_error() {
        let h = harness();
        h.cache.network.set_offline(true);

        let result = h.cache.handle(&FetchRequest::get("/assets/app.js")).await;
        assert!(matches!(result, Err(NetworkError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_swr_never_caches_excluded_urls() {
        let h = harness();
        let url = "https://www.googletagmanager.com/gtm.js";
        h.cache.network.respond(url, FetchResponse::ok("analytics"));
        let request = FetchRequest::get(url);

        let response = h.cache.handle(&request).await.unwrap();
        assert_eq!(response.body_text(), "analytics");

        settle().await;
        assert_eq!(h.cache.store.len("app-cache-v1").await.unwrap(), 0);
        assert!(h.sink.events().iter().any(|e| matches!(
            e,
            CacheEvent::WriteSkipped { reason, .. } if reason == "never-cache url"
        )));

        // Every request keeps going to the network.
        h.cache.handle(&request).await.unwrap();
        settle().await;
        assert_eq!(h.cache.store.len("app-cache-v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_get_bypasses_all_buckets() {
        let h = harness();
        let request = FetchRequest::new(Method::POST, "/rest/v1/events");

        h.cache.handle(&request).await.unwrap();
        assert!(h.cache.store.bucket_names().await.unwrap().is_empty());

        h.cache.network.set_offline(true);
        assert!(h.cache.handle(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_store_failure_never_fails_the_response() {
        let sink = Arc::new(MemorySink::new());
        let cache = FetchCache::new(
            CachePolicyConfig::default(),
            FailingStore,
            StubNetwork::new(),
        )
        .with_sink(sink.clone());

        let response = cache.handle(&FetchRequest::get("/manifest.json")).await.unwrap();
        assert!(response.is_success());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, CacheEvent::WriteFailed { .. })));
    }

    #[tokio::test]
    async fn test_lookup_events_carry_status() {
        let h = harness();
        h.cache.handle(&FetchRequest::get("/manifest.json")).await.unwrap();
        h.cache.handle(&FetchRequest::get("/manifest.json")).await.unwrap();

        let statuses: Vec<CacheStatus> = h
            .sink
            .events()
            .iter()
            .filter_map(|e| match e {
                CacheEvent::Lookup { status, .. } => Some(*status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![CacheStatus::Miss, CacheStatus::Hit]);
    }
}
