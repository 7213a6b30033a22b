//! Responses as they come back through the routing layer.

use std::fmt;

use bytes::Bytes;

/// Body of the synthesized last-resort navigation response.
pub const OFFLINE_PLACEHOLDER_BODY: &str = "You are offline and the page is not available.";

/// Where a response came from, surfaced to callers for the `x-cache`
/// header and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fetched from the upstream network on this request.
    Network,
    /// Served out of a named cache.
    Cache,
    /// Served out of the precache as a navigation fallback.
    Precache,
    /// Built locally, never fetched or cached.
    Synthesized,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Cache => "cache",
            Self::Precache => "precache",
            Self::Synthesized => "synthesized",
        }
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response flowing back out of the route table.
///
/// Status `0` marks an opaque response: a cross-origin fetch made in
/// `no-cors` mode whose real status the worker is not allowed to see. The
/// body and headers are retained so the bytes can still be cached and
/// replayed.
#[derive(Debug, Clone)]
pub struct WorkerResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl WorkerResponse {
    pub fn is_opaque(&self) -> bool {
        self.status == 0
    }

    /// The last-resort response for a navigation that cannot be served any
    /// other way.
    pub fn offline_placeholder() -> Self {
        Self {
            status: 503,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            headers: Vec::new(),
            body: Bytes::from_static(OFFLINE_PLACEHOLDER_BODY.as_bytes()),
            source: ResponseSource::Synthesized,
        }
    }
}
