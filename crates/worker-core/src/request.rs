//! Fetch request model.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use http::Method;
use serde::{Deserialize, Serialize};

/// Unique request identifier for log correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:x}-{:x}", nanos, seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Case-insensitive HTTP header map.
///
/// Names are stored lowercased; lookups accept any casing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: BTreeMap<String, String>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Get a header value by name (any casing).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    /// Check whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Remove a header, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&name.to_ascii_lowercase())
    }

    /// Iterate over (name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resource type a request is fetching, as reported by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level HTML document.
    Document,
    /// Image sub-resource.
    Image,
    /// Script sub-resource.
    Script,
    /// Stylesheet sub-resource.
    Style,
    /// Font sub-resource.
    Font,
    /// Anything else (XHR, data, etc.).
    #[default]
    Other,
}

/// Request mode, as reported by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level navigation to a document.
    Navigate,
    /// Same-origin sub-resource fetch.
    SameOrigin,
    /// Cross-origin fetch with CORS.
    Cors,
    /// Cross-origin fetch without CORS.
    #[default]
    NoCors,
}

/// A fetch request as seen by the cache policy layer.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: Method,
    /// Request URL. Same-origin URLs are given origin-relative
    /// (`/path?query`) so they key consistently with pre-cached assets;
    /// cross-origin URLs are absolute.
    pub url: String,
    /// Resource type being fetched.
    pub destination: Destination,
    /// Request mode.
    pub mode: RequestMode,
    /// Request headers.
    pub headers: Headers,
}

impl FetchRequest {
    /// Create a request with an explicit method.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            destination: Destination::default(),
            mode: RequestMode::default(),
            headers: Headers::new(),
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set the destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Set the request mode.
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether this is a GET request.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Whether the request carries a `Range` header.
    pub fn has_range_header(&self) -> bool {
        self.headers.contains("range")
    }

    /// The URL path, without scheme/host, query, or fragment.
    ///
    /// A URL with no path component yields `/`.
    pub fn path(&self) -> &str {
        let after_host = match self.url.find("://") {
            Some(idx) => {
                let rest = &self.url[idx + 3..];
                match rest.find('/') {
                    Some(slash) => &rest[slash..],
                    None => "/",
                }
            }
            None => self.url.as_str(),
        };
        let end = after_host.find(['?', '#']).unwrap_or(after_host.len());
        &after_host[..end]
    }

    /// Whether this request loads a top-level HTML document.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
            || self.destination == Destination::Document
            || self.path().ends_with(".html")
    }

    /// Key under which a response for this request is stored.
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}
