//! HTTP fetch pipeline for upstream requests.
//!
//! ### Transport vs HTTP errors
//! An HTTP error status (404, 500) is a *successful* fetch here: the
//! response is returned for the router to judge against its status
//! allow-list. Only transport failures (connect, TLS, timeout, body read)
//! surface as `Error::Fetch`.
//!
//! ### Opaque responses
//! A cross-origin request made in no-cors mode yields an opaque response:
//! its status is recorded as 0, the body is kept so it can still be cached
//! and replayed, and routes decide via their allow-list whether status 0 is
//! storable.
//!
//! ### Header forwarding
//! Headers carried on the request go upstream verbatim; a browser-style
//! `Accept` default is added only when the request carries none.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable), checked against Content-Length
//!   before the read and against the actual body after it.

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, header};

pub use url::{UrlError, canonicalize};

use cachefront_core::request::{RequestMode, WorkerRequest};
use cachefront_core::response::{ResponseSource, WorkerResponse};
use cachefront_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "cachefront/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Site origin for opaque-response classification.
    ///
    /// When unset, no response is marked opaque.
    pub origin: Option<Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "cachefront/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
        }
    }
}

impl FetchConfig {
    /// Derive a fetch configuration from the application config and the
    /// parsed site origin.
    pub fn from_app(config: &AppConfig, origin: Url) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: 5,
            origin: Some(origin),
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code; 0 for opaque responses
    pub status: u16,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response headers with UTF-8 values
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchedResponse {
    /// Convert into a router response attributed to `source`.
    pub fn into_response(self, source: ResponseSource) -> WorkerResponse {
        WorkerResponse {
            status: self.status,
            content_type: self.content_type,
            headers: self.headers,
            body: self.body,
            source,
        }
    }
}

/// The network seam of the router.
///
/// The gateway talks to upstream exclusively through this trait; tests swap
/// in a scripted implementation.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request from the upstream network.
    async fn fetch(&self, request: &WorkerRequest) -> Result<FetchedResponse, Error>;
}

/// The status a caller is allowed to observe: cross-origin no-cors
/// responses are opaque and report as 0.
fn observed_status(status: u16, request: &WorkerRequest, origin: Option<&Url>) -> u16 {
    match origin {
        Some(origin) if request.mode == RequestMode::NoCors && !request.same_origin_as(origin) => 0,
        _ => status,
    }
}

/// HTTP fetch client backed by reqwest.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &WorkerRequest) -> Result<FetchedResponse, Error> {
        let start = Instant::now();

        let method: reqwest::Method = request
            .method
            .parse()
            .map_err(|_| Error::Fetch(format!("invalid method: {}", request.method)))?;

        let mut builder = self.http.request(method, request.url.clone());
        if request.header("accept").is_none() {
            builder = builder.header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            );
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("network error: {}", e)))?;

        let status = response.status().as_u16();

        let content_length = response.content_length();
        if let Some(len) = content_length
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let final_url = response.url().clone();
        let raw_headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                body.len(),
                self.config.max_bytes
            )));
        }

        let content_type = raw_headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let headers: Vec<(String, String)> = raw_headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let status = observed_status(status, request, self.config.origin.as_ref());
        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} status {} in {}ms ({} bytes)",
            request.url,
            final_url,
            status,
            fetch_ms,
            body.len()
        );

        Ok(FetchedResponse { url: request.url.clone(), final_url, status, content_type, headers, body, fetch_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachefront_core::request::Destination;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "cachefront/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
        assert!(config.origin.is_none());
    }

    #[test]
    fn test_fetch_config_from_app() {
        let app = AppConfig { user_agent: "test/1".into(), max_bytes: 1024, timeout_ms: 500, ..Default::default() };
        let origin = Url::parse("http://localhost:8080").unwrap();
        let config = FetchConfig::from_app(&app, origin.clone());
        assert_eq!(config.user_agent, "test/1");
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.origin, Some(origin));
    }

    #[test]
    fn test_observed_status_marks_cross_origin_no_cors_opaque() {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let request = WorkerRequest::get(Url::parse("https://fonts.gstatic.com/s/inter.woff2").unwrap())
            .with_destination(Destination::Font)
            .with_mode(RequestMode::NoCors);
        assert_eq!(observed_status(200, &request, Some(&origin)), 0);
    }

    #[test]
    fn test_observed_status_keeps_same_origin() {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let request = WorkerRequest::get(Url::parse("http://localhost:8080/app.css").unwrap())
            .with_mode(RequestMode::NoCors);
        assert_eq!(observed_status(200, &request, Some(&origin)), 200);
    }

    #[test]
    fn test_observed_status_keeps_cors_mode() {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let request = WorkerRequest::get(Url::parse("https://fonts.gstatic.com/s/inter.woff2").unwrap())
            .with_mode(RequestMode::Cors);
        assert_eq!(observed_status(200, &request, Some(&origin)), 200);
    }

    #[test]
    fn test_observed_status_without_origin() {
        let request = WorkerRequest::get(Url::parse("https://fonts.gstatic.com/s/inter.woff2").unwrap())
            .with_mode(RequestMode::NoCors);
        assert_eq!(observed_status(200, &request, None), 200);
    }

    #[test]
    fn test_fetched_response_into_response() {
        let fetched = FetchedResponse {
            url: Url::parse("http://localhost:8080/app.css").unwrap(),
            final_url: Url::parse("http://localhost:8080/app.css").unwrap(),
            status: 200,
            content_type: Some("text/css".to_string()),
            headers: vec![("etag".to_string(), "\"abc\"".to_string())],
            body: Bytes::from_static(b"body {}"),
            fetch_ms: 12,
        };

        let response = fetched.into_response(ResponseSource::Network);
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("text/css"));
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(response.body, Bytes::from_static(b"body {}"));
    }

    #[tokio::test]
    async fn test_http_fetcher_new() {
        let config = FetchConfig::default();
        let fetcher = HttpFetcher::new(config);
        assert!(fetcher.is_ok());
    }
}
