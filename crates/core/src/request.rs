//! Requests as the routing layer sees them.
//!
//! A [`WorkerRequest`] carries the dimensions route matching cares about
//! (URL, method, the kind of resource being loaded, the request mode)
//! plus the body and the end-to-end headers, so a request that matches no
//! route can still be forwarded upstream the way the client sent it.

use std::fmt;

use bytes::Bytes;
use url::Url;

/// What kind of resource a request is loading, mirroring the
/// `Sec-Fetch-Dest` vocabulary for the destinations routes match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Style,
    Script,
    Image,
    Font,
    Other,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` value; unknown destinations fold to `Other`.
    pub fn parse(value: &str) -> Self {
        match value {
            "document" => Self::Document,
            "style" => Self::Style,
            "script" => Self::Script,
            "image" => Self::Image,
            "font" => Self::Font,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Style => "style",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request mode, mirroring `Sec-Fetch-Mode`.
///
/// `Navigate` drives the page route; `NoCors` against a foreign origin is
/// what produces opaque responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

impl RequestMode {
    /// Parse a `Sec-Fetch-Mode` value; unknown modes fold to `Cors`.
    pub fn parse(value: &str) -> Self {
        match value {
            "navigate" => Self::Navigate,
            "same-origin" => Self::SameOrigin,
            "no-cors" => Self::NoCors,
            _ => Self::Cors,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::SameOrigin => "same-origin",
            Self::NoCors => "no-cors",
            Self::Cors => "cors",
        }
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request flowing through the route table.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub url: Url,
    pub method: String,
    pub destination: Destination,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl WorkerRequest {
    /// A plain GET subresource request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            destination: Destination::Other,
            mode: RequestMode::Cors,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// A top-level page navigation.
    pub fn navigation(url: Url) -> Self {
        Self::get(url).with_destination(Destination::Document).with_mode(RequestMode::Navigate)
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive lookup of a carried header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether the request targets the given origin (scheme, host, port).
    pub fn same_origin_as(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_parsing() {
        assert_eq!(Destination::parse("style"), Destination::Style);
        assert_eq!(Destination::parse("font"), Destination::Font);
        assert_eq!(Destination::parse("audioworklet"), Destination::Other);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(RequestMode::parse("navigate"), RequestMode::Navigate);
        assert_eq!(RequestMode::parse("no-cors"), RequestMode::NoCors);
        assert_eq!(RequestMode::parse("websocket"), RequestMode::Cors);
    }

    #[test]
    fn test_navigation_constructor() {
        let request = WorkerRequest::navigation(Url::parse("http://localhost:8080/posts/hello").unwrap());
        assert!(request.is_get());
        assert!(request.is_navigation());
        assert_eq!(request.destination, Destination::Document);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = WorkerRequest::get(Url::parse("http://localhost:8080/posts/one.md").unwrap())
            .with_headers(vec![("If-None-Match".to_string(), "\"abc\"".to_string())]);
        assert_eq!(request.header("if-none-match"), Some("\"abc\""));
        assert_eq!(request.header("range"), None);
    }

    #[test]
    fn test_same_origin_check() {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let same = WorkerRequest::get(Url::parse("http://localhost:8080/app.css").unwrap());
        let other = WorkerRequest::get(Url::parse("https://fonts.gstatic.com/s/inter.woff2").unwrap());
        assert!(same.same_origin_as(&origin));
        assert!(!other.same_origin_as(&origin));
    }
}
