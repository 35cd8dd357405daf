//! Fetch response model and synthetic fallback responses.

use http::StatusCode;

use crate::request::Headers;

/// Header stamped into stored API responses at write time, holding the
/// store timestamp in milliseconds since the Unix epoch.
pub const CACHED_AT_HEADER: &str = "cached-at";

/// Placeholder served for image requests when the network is unreachable.
const PLACEHOLDER_SVG: &str = "<svg width=\"200\" height=\"200\" xmlns=\"http://www.w3.org/2000/svg\"><rect width=\"100%\" height=\"100%\" fill=\"#ddd\"/></svg>";

/// A fetch response as seen by the cache policy layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Create a 200 OK response with a body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether this is a 206 Partial Content response.
    pub fn is_partial(&self) -> bool {
        self.status == StatusCode::PARTIAL_CONTENT
    }

    /// Whether the response may be written to a cache bucket:
    /// successful and not partial.
    pub fn is_cacheable(&self) -> bool {
        self.is_success() && !self.is_partial()
    }

    /// Body as lossy UTF-8 text.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Synthetic 503 returned when the network is unreachable and no
    /// usable cached entry exists.
    pub fn offline_503() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE).with_body("Offline")
    }

    /// Inline SVG placeholder returned for failed image requests so
    /// broken images degrade gracefully.
    pub fn placeholder_image() -> Self {
        Self::ok(PLACEHOLDER_SVG).with_header("content-type", "image/svg+xml")
    }

    /// Stamp the store timestamp header.
    pub fn with_cached_at(mut self, millis: u64) -> Self {
        self.headers.insert(CACHED_AT_HEADER, millis.to_string());
        self
    }

    /// Read the store timestamp header, if present and well-formed.
    pub fn cached_at_millis(&self) -> Option<u64> {
        self.headers
            .get(CACHED_AT_HEADER)
            .and_then(|v| v.parse().ok())
    }

    /// Age of the stored response relative to `now_millis`.
    ///
    /// Returns `None` when the response carries no timestamp.
    pub fn age_millis(&self, now_millis: u64) -> Option<u64> {
        self.cached_at_millis()
            .map(|at| now_millis.saturating_sub(at))
    }
}
