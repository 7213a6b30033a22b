//! The route table: ordered matchers mapping requests to caching policies.
//!
//! Rules are declared once at startup and evaluated first-match-wins for
//! every intercepted request. Only GET requests are routed; everything else
//! passes through to the network untouched.

use std::time::Duration;

use cachefront_core::AppConfig;
use cachefront_core::generation::CacheName;
use cachefront_core::request::{Destination, RequestMode, WorkerRequest};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Caching policy applied by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// HTTP statuses a route is allowed to store.
///
/// Status 0 stands for opaque cross-origin responses; routes that cache
/// third-party assets include it, same-origin routes accept only 200.
#[derive(Debug, Clone)]
pub struct CacheableStatuses(Vec<u16>);

impl CacheableStatuses {
    pub fn new(statuses: impl Into<Vec<u16>>) -> Self {
        Self(statuses.into())
    }

    pub fn ok_only() -> Self {
        Self::new([200])
    }

    pub fn ok_or_opaque() -> Self {
        Self::new([0, 200])
    }

    pub fn allows(&self, status: u16) -> bool {
        self.0.contains(&status)
    }
}

/// Per-cache eviction bounds, enforced after every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationPolicy {
    /// Entry-count bound; oldest insertions are evicted beyond it.
    pub max_entries: Option<u32>,
    /// Age bound; older entries read as misses and are purged on write.
    pub max_age: Option<Duration>,
}

impl ExpirationPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn bounded(max_entries: u32, max_age: Duration) -> Self {
        Self { max_entries: Some(max_entries), max_age: Some(max_age) }
    }
}

/// Predicate deciding whether a route governs a request.
#[derive(Debug, Clone)]
pub enum RouteMatcher {
    /// Request destination is one of the listed kinds.
    Destination(Vec<Destination>),
    /// URL host is one of the listed hosts.
    Host(Vec<String>),
    /// URL path ends with the suffix.
    PathSuffix(String),
    /// Request mode equals the given mode.
    Mode(RequestMode),
}

impl RouteMatcher {
    pub fn matches(&self, request: &WorkerRequest) -> bool {
        match self {
            Self::Destination(kinds) => kinds.contains(&request.destination),
            Self::Host(hosts) => request.host().is_some_and(|h| hosts.iter().any(|host| host == h)),
            Self::PathSuffix(suffix) => request.url.path().ends_with(suffix.as_str()),
            Self::Mode(mode) => request.mode == *mode,
        }
    }
}

/// One rule of the route table.
#[derive(Debug, Clone)]
pub struct Route {
    pub matcher: RouteMatcher,
    pub strategy: Strategy,
    pub cache: CacheName,
    pub cacheable: CacheableStatuses,
    pub expiration: ExpirationPolicy,
    /// Navigation routes resolve total failure through the offline
    /// fallback chain instead of propagating it.
    pub offline_fallback: bool,
}

/// Ordered, immutable route rules.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The first rule matching a request, or None for passthrough.
    ///
    /// Non-GET requests never match: caching stored responses for
    /// side-effecting methods would be wrong, so they always pass through.
    pub fn first_match(&self, request: &WorkerRequest) -> Option<&Route> {
        if !request.is_get() {
            return None;
        }
        self.routes.iter().find(|route| route.matcher.matches(request))
    }
}

/// Build the standard route table from the application config.
///
/// Declaration order is load-bearing: a stylesheet served from a CDN host
/// matches the destination rule before the host rule ever sees it.
pub fn standard_routes(config: &AppConfig) -> RouteTable {
    let generation = config.current_generation();

    RouteTable::new(vec![
        Route {
            matcher: RouteMatcher::Destination(vec![Destination::Style, Destination::Script]),
            strategy: Strategy::CacheFirst,
            cache: CacheName::versioned("static-resources", &generation),
            cacheable: CacheableStatuses::ok_only(),
            expiration: ExpirationPolicy::bounded(50, 30 * DAY),
            offline_fallback: false,
        },
        Route {
            matcher: RouteMatcher::Destination(vec![Destination::Image]),
            strategy: Strategy::CacheFirst,
            cache: CacheName::versioned("images", &generation),
            cacheable: CacheableStatuses::ok_only(),
            expiration: ExpirationPolicy::bounded(60, 30 * DAY),
            offline_fallback: false,
        },
        Route {
            matcher: RouteMatcher::Host(config.font_stylesheet_hosts.clone()),
            strategy: Strategy::StaleWhileRevalidate,
            cache: CacheName::shared("font-stylesheets"),
            cacheable: CacheableStatuses::ok_or_opaque(),
            expiration: ExpirationPolicy::none(),
            offline_fallback: false,
        },
        Route {
            matcher: RouteMatcher::Host(config.font_file_hosts.clone()),
            strategy: Strategy::CacheFirst,
            cache: CacheName::shared("font-files"),
            cacheable: CacheableStatuses::ok_or_opaque(),
            expiration: ExpirationPolicy::bounded(30, 365 * DAY),
            offline_fallback: false,
        },
        Route {
            matcher: RouteMatcher::Host(config.cdn_hosts.clone()),
            strategy: Strategy::CacheFirst,
            cache: CacheName::shared("cdn-resources"),
            cacheable: CacheableStatuses::ok_or_opaque(),
            expiration: ExpirationPolicy::bounded(30, 365 * DAY),
            offline_fallback: false,
        },
        Route {
            matcher: RouteMatcher::PathSuffix(config.articles_index.clone()),
            strategy: Strategy::StaleWhileRevalidate,
            cache: CacheName::versioned("api-data", &generation),
            cacheable: CacheableStatuses::ok_only(),
            expiration: ExpirationPolicy::bounded(10, DAY),
            offline_fallback: false,
        },
        Route {
            matcher: RouteMatcher::PathSuffix(".md".to_string()),
            strategy: Strategy::NetworkFirst,
            cache: CacheName::versioned("markdown-content", &generation),
            cacheable: CacheableStatuses::ok_only(),
            expiration: ExpirationPolicy::bounded(100, 7 * DAY),
            offline_fallback: false,
        },
        Route {
            matcher: RouteMatcher::Mode(RequestMode::Navigate),
            strategy: Strategy::NetworkFirst,
            cache: CacheName::versioned("pages", &generation),
            cacheable: CacheableStatuses::ok_only(),
            expiration: ExpirationPolicy::bounded(20, 7 * DAY),
            offline_fallback: true,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn table() -> RouteTable {
        standard_routes(&AppConfig::default())
    }

    fn get(url: &str) -> WorkerRequest {
        WorkerRequest::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_style_and_script_hit_static_resources() {
        let table = table();
        let css = get("http://localhost:8080/styles/common.css").with_destination(Destination::Style);
        let js = get("http://localhost:8080/scripts/blog.js").with_destination(Destination::Script);

        for request in [css, js] {
            let route = table.first_match(&request).unwrap();
            assert_eq!(route.cache.as_str(), "static-resources-v1");
            assert_eq!(route.strategy, Strategy::CacheFirst);
            assert!(route.cacheable.allows(200));
            assert!(!route.cacheable.allows(0));
        }
    }

    #[test]
    fn test_image_route() {
        let table = table();
        let request = get("http://localhost:8080/images/logo-48.webp").with_destination(Destination::Image);
        let route = table.first_match(&request).unwrap();
        assert_eq!(route.cache.as_str(), "images-v1");
        assert_eq!(route.expiration.max_entries, Some(60));
    }

    #[test]
    fn test_font_stylesheet_host_is_swr_unbounded() {
        let table = table();
        let request = get("https://fonts.googleapis.com/css2?family=Inter");
        let route = table.first_match(&request).unwrap();
        assert_eq!(route.cache.as_str(), "font-stylesheets");
        assert_eq!(route.strategy, Strategy::StaleWhileRevalidate);
        assert!(route.cacheable.allows(0));
        assert!(route.expiration.max_entries.is_none());
        assert!(route.expiration.max_age.is_none());
    }

    #[test]
    fn test_font_file_and_cdn_hosts_accept_opaque() {
        let table = table();

        let font = get("https://fonts.gstatic.com/s/inter.woff2").with_destination(Destination::Font);
        let route = table.first_match(&font).unwrap();
        assert_eq!(route.cache.as_str(), "font-files");
        assert!(route.cacheable.allows(0));

        let cdn = get("https://cdnjs.cloudflare.com/ajax/libs/marked/marked.min.json");
        let route = table.first_match(&cdn).unwrap();
        assert_eq!(route.cache.as_str(), "cdn-resources");
        assert_eq!(route.expiration.max_entries, Some(30));
    }

    #[test]
    fn test_declaration_order_wins_for_cdn_scripts() {
        // a script loaded from the CDN host matches the destination rule
        // first, so it lands in static-resources, not cdn-resources
        let table = table();
        let request = get("https://cdnjs.cloudflare.com/ajax/libs/marked/marked.min.js")
            .with_destination(Destination::Script);
        let route = table.first_match(&request).unwrap();
        assert_eq!(route.cache.as_str(), "static-resources-v1");
    }

    #[test]
    fn test_articles_index_and_markdown_suffixes() {
        let table = table();

        let index = get("http://localhost:8080/data/articles.json");
        let route = table.first_match(&index).unwrap();
        assert_eq!(route.cache.as_str(), "api-data-v1");
        assert_eq!(route.strategy, Strategy::StaleWhileRevalidate);

        let markdown = get("http://localhost:8080/posts/first-post.md");
        let route = table.first_match(&markdown).unwrap();
        assert_eq!(route.cache.as_str(), "markdown-content-v1");
        assert_eq!(route.strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_navigation_route_has_offline_fallback() {
        let table = table();
        let request = WorkerRequest::navigation(Url::parse("http://localhost:8080/blog/").unwrap());
        let route = table.first_match(&request).unwrap();
        assert_eq!(route.cache.as_str(), "pages-v1");
        assert_eq!(route.strategy, Strategy::NetworkFirst);
        assert!(route.offline_fallback);
    }

    #[test]
    fn test_unmatched_request_is_passthrough() {
        let request = get("http://localhost:8080/api/search?q=rust");
        assert!(table().first_match(&request).is_none());
    }

    #[test]
    fn test_non_get_never_matches() {
        let request = get("http://localhost:8080/styles/common.css")
            .with_destination(Destination::Style)
            .with_method("POST");
        assert!(table().first_match(&request).is_none());
    }

    #[test]
    fn test_generation_flows_into_cache_names() {
        let config = AppConfig { generation: "9".into(), ..Default::default() };
        let table = standard_routes(&config);
        let request = get("http://localhost:8080/app.css").with_destination(Destination::Style);
        assert_eq!(table.first_match(&request).unwrap().cache.as_str(), "static-resources-v9");
    }

    #[test]
    fn test_cacheable_statuses() {
        assert!(CacheableStatuses::ok_only().allows(200));
        assert!(!CacheableStatuses::ok_only().allows(404));
        assert!(!CacheableStatuses::ok_only().allows(0));
        assert!(CacheableStatuses::ok_or_opaque().allows(0));
        assert!(CacheableStatuses::new(vec![200, 304]).allows(304));
    }
}
