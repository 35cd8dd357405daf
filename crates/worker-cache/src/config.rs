//! Engine configuration.
//!
//! An explicit configuration object replaces the module-level constants a
//! browser worker would declare. Bumping the bucket version names is the
//! only cross-deployment cache invalidation mechanism: buckets with
//! non-current names are swept on the next activation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the fetch-cache engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicyConfig {
    /// Versioned bucket for stale-while-revalidate entries.
    pub generic_bucket: String,
    /// Versioned bucket for pre-cached static assets.
    pub static_bucket: String,
    /// Versioned bucket for API responses.
    pub api_bucket: String,
    /// Versioned bucket for images.
    pub image_bucket: String,
    /// Asset paths pre-warmed into the static bucket on install.
    pub precache_assets: Vec<String>,
    /// URL prefixes classified as API requests.
    pub api_prefixes: Vec<String>,
    /// Maximum number of entries held in the image bucket. Once reached,
    /// new entries are refused; existing entries are not evicted.
    pub image_entry_cap: usize,
    /// Maximum age of an API entry served while the network is down.
    pub api_ttl: Duration,
    /// Age past which the janitor deletes API entries.
    pub sweep_max_age: Duration,
    /// Interval between janitor sweeps.
    pub sweep_interval: Duration,
    /// URL substrings whose responses must never be stored
    /// (third-party analytics, extension schemes).
    pub never_cache_urls: Vec<String>,
    /// Path of the document served when navigation fails offline.
    pub offline_document: String,
}

impl Default for CachePolicyConfig {
    fn default() -> Self {
        Self {
            generic_bucket: "app-cache-v1".to_string(),
            static_bucket: "static-v1".to_string(),
            api_bucket: "api-v1".to_string(),
            image_bucket: "images-v1".to_string(),
            precache_assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
                "/favicon.ico".to_string(),
                "/offline.html".to_string(),
            ],
            api_prefixes: vec!["/rest/v1/".to_string(), "/functions/v1/".to_string()],
            image_entry_cap: 50,
            api_ttl: Duration::from_secs(5 * 60),
            sweep_max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            never_cache_urls: vec![
                "googleapis.com".to_string(),
                "googletagmanager.com".to_string(),
                "chrome-extension:".to_string(),
            ],
            offline_document: "/index.html".to_string(),
        }
    }
}

impl CachePolicyConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set all four bucket names from a version suffix
    /// (e.g. `v4` yields `static-v4`, `api-v4`, ...).
    pub fn with_version(mut self, version: &str) -> Self {
        self.generic_bucket = format!("app-cache-{}", version);
        self.static_bucket = format!("static-{}", version);
        self.api_bucket = format!("api-{}", version);
        self.image_bucket = format!("images-{}", version);
        self
    }

    /// Replace the pre-cache asset manifest.
    pub fn with_precache_assets(mut self, assets: Vec<String>) -> Self {
        self.precache_assets = assets;
        self
    }

    /// Add an API URL prefix.
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefixes.push(prefix.into());
        self
    }

    /// Set the image bucket entry cap.
    pub fn with_image_entry_cap(mut self, cap: usize) -> Self {
        self.image_entry_cap = cap;
        self
    }

    /// Set the API entry TTL.
    pub fn with_api_ttl(mut self, ttl: Duration) -> Self {
        self.api_ttl = ttl;
        self
    }

    /// Set the janitor max entry age.
    pub fn with_sweep_max_age(mut self, age: Duration) -> Self {
        self.sweep_max_age = age;
        self
    }

    /// Set the janitor sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Add a never-cache URL substring.
    pub fn with_never_cache_url(mut self, fragment: impl Into<String>) -> Self {
        self.never_cache_urls.push(fragment.into());
        self
    }

    /// Set the offline fallback document path.
    pub fn with_offline_document(mut self, path: impl Into<String>) -> Self {
        self.offline_document = path.into();
        self
    }

    /// The bucket names retained across an activation sweep.
    pub fn current_buckets(&self) -> [&str; 4] {
        [
            self.generic_bucket.as_str(),
            self.static_bucket.as_str(),
            self.api_bucket.as_str(),
            self.image_bucket.as_str(),
        ]
    }

    /// Whether a path is a declared pre-cache asset (exact match).
    pub fn is_precache_asset(&self, path: &str) -> bool {
        self.precache_assets.iter().any(|a| a == path)
    }

    /// Whether a path contains a declared API prefix.
    pub fn is_api_path(&self, path: &str) -> bool {
        self.api_prefixes.iter().any(|p| path.contains(p.as_str()))
    }

    /// Whether a URL must never be stored.
    pub fn is_never_cache_url(&self, url: &str) -> bool {
        self.never_cache_urls.iter().any(|f| url.contains(f.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tunables() {
        let config = CachePolicyConfig::default();
        assert_eq!(config.image_entry_cap, 50);
        assert_eq!(config.api_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_max_age, Duration::from_secs(86_400));
        assert_eq!(config.sweep_interval, Duration::from_secs(3_600));
        assert_eq!(config.offline_document, "/index.html");
    }

    #[test]
    fn test_with_version() {
        let config = CachePolicyConfig::default().with_version("v7");
        assert_eq!(
            config.current_buckets(),
            ["app-cache-v7", "static-v7", "api-v7", "images-v7"]
        );
    }

    #[test]
    fn test_classification_helpers() {
        let config = CachePolicyConfig::default();
        assert!(config.is_precache_asset("/index.html"));
        assert!(!config.is_precache_asset("/index"));
        assert!(config.is_api_path("/rest/v1/events"));
        assert!(config.is_api_path("/functions/v1/send-email"));
        assert!(!config.is_api_path("/assets/app.js"));
        assert!(config.is_never_cache_url("https://fonts.googleapis.com/css2"));
        assert!(config.is_never_cache_url("chrome-extension://abcdef/script.js"));
        assert!(!config.is_never_cache_url("/rest/v1/events"));
    }
}
