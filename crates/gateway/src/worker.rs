//! The worker ties bootstrap, routing and fallback together.
//!
//! `Worker::bootstrap` opens the store, runs install and activate, and
//! builds the route table. When the store cannot be opened the worker
//! comes up degraded instead of refusing to start: every request is
//! forwarded to the origin until the next restart.

use std::sync::Arc;

use cachefront_client::Fetcher;
use cachefront_core::config::AppConfig;
use cachefront_core::response::{ResponseSource, WorkerResponse};
use cachefront_core::storage::CacheStore;
use cachefront_core::{CacheName, Error, PrecacheManifest, WorkerRequest};
use url::Url;

use crate::lifecycle;
use crate::routes::{Route, RouteTable, standard_routes};
use crate::strategy::StrategyRunner;

/// Front door for every request the gateway accepts.
pub struct Worker {
    origin: Url,
    state: WorkerState,
}

enum WorkerState {
    Ready(FetchHandler),
    Degraded(Arc<dyn Fetcher>),
}

impl Worker {
    /// Open the store, run the install and activate phases and build the
    /// route table. Storage failures degrade the worker to a plain proxy;
    /// any other failure aborts startup.
    pub async fn bootstrap(config: &AppConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|err| Error::InvalidUrl(err.to_string()))?;

        match Self::try_ready(config, Arc::clone(&fetcher)).await {
            Ok(handler) => {
                tracing::info!(origin = %origin, generation = %config.generation, "worker ready");
                Ok(Self { origin, state: WorkerState::Ready(handler) })
            }
            Err(err) if err.is_storage() => {
                tracing::error!(error = %err, "cache store unavailable, serving passthrough only");
                Ok(Self { origin, state: WorkerState::Degraded(fetcher) })
            }
            Err(err) => Err(err),
        }
    }

    async fn try_ready(config: &AppConfig, fetcher: Arc<dyn Fetcher>) -> Result<FetchHandler, Error> {
        let store = CacheStore::open(&config.db_path).await?;
        FetchHandler::build(config, store, fetcher).await
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.state, WorkerState::Degraded(_))
    }

    /// Route a request. A ready worker whose store fails mid-request
    /// retries the request once as a passthrough rather than surfacing
    /// the storage error to the client.
    pub async fn handle(&self, request: &WorkerRequest) -> Result<WorkerResponse, Error> {
        match &self.state {
            WorkerState::Ready(handler) => match handler.handle(request).await {
                Err(err) if err.is_storage() => {
                    tracing::warn!(url = %request.url, error = %err, "cache store failed, retrying as passthrough");
                    handler.passthrough(request).await
                }
                result => result,
            },
            WorkerState::Degraded(fetcher) => {
                let fetched = fetcher.fetch(request).await?;
                Ok(fetched.into_response(ResponseSource::Network))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn ready(origin: Url, handler: FetchHandler) -> Self {
        Self { origin, state: WorkerState::Ready(handler) }
    }

    #[cfg(test)]
    pub(crate) fn degraded(origin: Url, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { origin, state: WorkerState::Degraded(fetcher) }
    }
}

/// Request handling for a worker with a working cache store.
pub struct FetchHandler {
    routes: RouteTable,
    runner: StrategyRunner,
    precache: CacheName,
    offline_url: Url,
}

impl FetchHandler {
    /// Install the precache, drop stale generations and assemble the
    /// route table. The offline document must be listed in the manifest,
    /// or there would be nothing to install behind the navigation
    /// fallback.
    pub async fn build(config: &AppConfig, store: CacheStore, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|err| Error::InvalidUrl(err.to_string()))?;
        let generation = config.current_generation();
        let manifest = PrecacheManifest::from_paths(&origin, config.precache_paths.iter().map(String::as_str))?;
        let offline_url = manifest
            .url_for(&config.offline_path)
            .cloned()
            .ok_or_else(|| Error::InvalidUrl(format!("offline path {} is not in the precache manifest", config.offline_path)))?;

        lifecycle::install(&store, fetcher.as_ref(), &manifest, &generation).await?;
        let activation = lifecycle::activate(&store, &generation).await?;
        if !activation.deleted.is_empty() {
            tracing::info!(caches = activation.deleted.len(), generation = %generation, "stale generations cleared");
        }

        Ok(Self {
            routes: standard_routes(config),
            runner: StrategyRunner::new(store, fetcher),
            precache: CacheName::precache(&generation),
            offline_url,
        })
    }

    async fn handle(&self, request: &WorkerRequest) -> Result<WorkerResponse, Error> {
        match self.routes.first_match(request) {
            None => self.runner.passthrough(request).await,
            Some(route) if route.offline_fallback => Ok(self.navigate(route, request).await),
            Some(route) => self.runner.run(route, request).await,
        }
    }

    async fn passthrough(&self, request: &WorkerRequest) -> Result<WorkerResponse, Error> {
        self.runner.passthrough(request).await
    }

    /// Navigation never fails: after the route's policy comes the
    /// precached offline document, and after that a synthesized 503.
    async fn navigate(&self, route: &Route, request: &WorkerRequest) -> WorkerResponse {
        match self.runner.run(route, request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "navigation failed, serving offline document");
                match self.runner.store().get(&self.precache, self.offline_url.as_str()).await {
                    Ok(Some(entry)) => entry.into_response(ResponseSource::Precache),
                    Ok(None) => {
                        tracing::error!(url = %self.offline_url, "offline document missing from precache");
                        WorkerResponse::offline_placeholder()
                    }
                    Err(store_err) => {
                        tracing::error!(error = %store_err, "offline document unreadable");
                        WorkerResponse::offline_placeholder()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use cachefront_core::response::OFFLINE_PLACEHOLDER_BODY;

    fn test_config(precache_paths: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.origin = "http://localhost:8080".to_string();
        config.generation = "1".to_string();
        config.precache_paths = precache_paths.iter().map(|p| p.to_string()).collect();
        config.offline_path = "/offline.html".to_string();
        // validation guarantees the offline path is listed; whether it gets
        // precached depends on what the fetcher is scripted with
        if !config.precache_paths.iter().any(|path| path == "/offline.html") {
            config.precache_paths.push("/offline.html".to_string());
        }
        config
    }

    async fn ready_worker(config: &AppConfig, fetcher: Arc<FakeFetcher>) -> (Worker, CacheStore) {
        let store = CacheStore::open_in_memory().await.unwrap();
        let handler = FetchHandler::build(config, store.clone(), fetcher as Arc<dyn Fetcher>).await.unwrap();
        let origin = config.origin_url().unwrap();
        (Worker::ready(origin, handler), store)
    }

    fn navigation(url: &str) -> WorkerRequest {
        WorkerRequest::navigation(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_navigation_miss_serves_offline_document() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("http://localhost:8080/offline.html", 200, "text/html", "<html>offline</html>");
        let (worker, _store) = ready_worker(&test_config(&["/offline.html"]), Arc::clone(&fetcher)).await;

        fetcher.set_offline(true);
        let response = worker.handle(&navigation("http://localhost:8080/articles/first")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.source, ResponseSource::Precache);
        assert_eq!(response.body.as_ref(), b"<html>offline</html>");
    }

    #[tokio::test]
    async fn test_navigation_total_failure_synthesizes_503() {
        let fetcher = Arc::new(FakeFetcher::new());
        let (worker, _store) = ready_worker(&test_config(&[]), Arc::clone(&fetcher)).await;

        fetcher.set_offline(true);
        let response = worker.handle(&navigation("http://localhost:8080/articles/first")).await.unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(response.source, ResponseSource::Synthesized);
        assert_eq!(response.body.as_ref(), OFFLINE_PLACEHOLDER_BODY.as_bytes());
        assert_eq!(response.content_type.as_deref(), Some("text/plain; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_navigation_prefers_page_cache_over_offline_document() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("http://localhost:8080/offline.html", 200, "text/html", "<html>offline</html>");
        fetcher.respond("http://localhost:8080/articles/first", 200, "text/html", "<html>the page</html>");
        let (worker, _store) = ready_worker(&test_config(&["/offline.html"]), Arc::clone(&fetcher)).await;

        let online = worker.handle(&navigation("http://localhost:8080/articles/first")).await.unwrap();
        assert_eq!(online.source, ResponseSource::Network);

        fetcher.set_offline(true);
        let offline = worker.handle(&navigation("http://localhost:8080/articles/first")).await.unwrap();

        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.body.as_ref(), b"<html>the page</html>");
    }

    #[tokio::test]
    async fn test_unmatched_request_is_passthrough() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("http://localhost:8080/api/search", 200, "application/json", "{}");
        let (worker, store) = ready_worker(&test_config(&[]), Arc::clone(&fetcher)).await;

        let response = worker.handle(&WorkerRequest::get(Url::parse("http://localhost:8080/api/search").unwrap())).await.unwrap();

        assert_eq!(response.source, ResponseSource::Network);
        assert!(store.list_cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_worker_forwards_everything() {
        let fetcher = Arc::new(FakeFetcher::new());
        fetcher.respond("http://localhost:8080/styles/common.css", 200, "text/css", "body {}");
        let origin = Url::parse("http://localhost:8080").unwrap();
        let worker = Worker::degraded(origin, Arc::clone(&fetcher) as Arc<dyn Fetcher>);

        assert!(worker.is_degraded());

        let request = WorkerRequest::get(Url::parse("http://localhost:8080/styles/common.css").unwrap());
        let first = worker.handle(&request).await.unwrap();
        let second = worker.handle(&request).await.unwrap();

        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(second.source, ResponseSource::Network);
        assert_eq!(fetcher.call_count("http://localhost:8080/styles/common.css"), 2);
    }

    #[tokio::test]
    async fn test_bootstrap_reports_bad_origin() {
        let mut config = test_config(&[]);
        config.origin = "not a url".to_string();
        let fetcher = Arc::new(FakeFetcher::new()) as Arc<dyn Fetcher>;

        let result = Worker::bootstrap(&config, fetcher).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_build_requires_offline_document_in_manifest() {
        let mut config = test_config(&[]);
        config.precache_paths = vec!["/index.html".to_string()];
        let store = CacheStore::open_in_memory().await.unwrap();
        let fetcher = Arc::new(FakeFetcher::new()) as Arc<dyn Fetcher>;

        let result = FetchHandler::build(&config, store, fetcher).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
