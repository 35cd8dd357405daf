//! Request classification.
//!
//! Classification is an explicit ordered list of (predicate, strategy)
//! rules evaluated first-match, so each rule is independently testable
//! and the priority order is visible in one place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use worker_core::{Destination, FetchRequest};

use crate::config::CachePolicyConfig;

/// Caching strategy selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Pass straight through to the network (non-GET).
    Bypass,
    /// Serve from cache, fetch and store on miss.
    CacheFirst,
    /// Cache-first with capped storage and an image placeholder fallback.
    CacheFirstImage,
    /// Network first, cached fallback bounded by a TTL.
    NetworkFirstTtl,
    /// Network first with cache-bypass semantics, pinned offline fallback.
    NetworkFirstNavigation,
    /// Serve cached immediately, refresh in the background.
    StaleWhileRevalidate,
}

impl StrategyKind {
    /// Stable name used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::CacheFirst => "cache_first",
            Self::CacheFirstImage => "cache_first_image",
            Self::NetworkFirstTtl => "network_first_ttl",
            Self::NetworkFirstNavigation => "network_first_navigation",
            Self::StaleWhileRevalidate => "stale_while_revalidate",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type Predicate = Arc<dyn Fn(&FetchRequest) -> bool + Send + Sync>;

/// A single classification rule.
#[derive(Clone)]
pub struct DispatchRule {
    name: &'static str,
    strategy: StrategyKind,
    predicate: Predicate,
}

impl DispatchRule {
    /// Create a rule.
    pub fn new(
        name: &'static str,
        strategy: StrategyKind,
        predicate: impl Fn(&FetchRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            strategy,
            predicate: Arc::new(predicate),
        }
    }

    /// Rule name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Strategy this rule selects.
    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Whether the rule matches a request.
    pub fn matches(&self, request: &FetchRequest) -> bool {
        (self.predicate)(request)
    }
}

impl std::fmt::Debug for DispatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRule")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// First-match strategy dispatcher.
///
/// Rules are mutually exclusive by construction: they are checked in
/// priority order and the first match wins.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    rules: Vec<DispatchRule>,
    fallback: StrategyKind,
}

impl Dispatcher {
    /// Build the standard rule set from a configuration.
    ///
    /// Priority order: non-GET, declared static asset, image, API prefix,
    /// navigation; everything else falls back to stale-while-revalidate.
    pub fn from_config(config: &CachePolicyConfig) -> Self {
        let assets = config.precache_assets.clone();
        let prefixes = config.api_prefixes.clone();

        let rules = vec![
            DispatchRule::new("non-get", StrategyKind::Bypass, |req| !req.is_get()),
            DispatchRule::new("static-asset", StrategyKind::CacheFirst, move |req| {
                assets.iter().any(|a| req.path() == a)
            }),
            DispatchRule::new("image", StrategyKind::CacheFirstImage, |req| {
                req.destination == Destination::Image
            }),
            DispatchRule::new("api", StrategyKind::NetworkFirstTtl, move |req| {
                let path = req.path();
                prefixes.iter().any(|p| path.contains(p.as_str()))
            }),
            DispatchRule::new(
                "navigation",
                StrategyKind::NetworkFirstNavigation,
                |req| req.is_navigation(),
            ),
        ];

        Self {
            rules,
            fallback: StrategyKind::StaleWhileRevalidate,
        }
    }

    /// Classify a request: first matching rule wins.
    pub fn classify(&self, request: &FetchRequest) -> StrategyKind {
        self.rules
            .iter()
            .find(|rule| rule.matches(request))
            .map(|rule| rule.strategy())
            .unwrap_or(self.fallback)
    }

    /// The ordered rule list.
    pub fn rules(&self) -> &[DispatchRule] {
        &self.rules
    }
}
