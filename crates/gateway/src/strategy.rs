//! Policy execution: cache-first, network-first, stale-while-revalidate.
//!
//! The runner owns the two resources every policy needs, the cache store
//! and the fetcher, and keeps the failure rules in one place: cache write
//! failures are logged and swallowed (the response in hand still goes out),
//! cache read failures propagate so the worker can retry the request as a
//! passthrough.

use std::sync::Arc;

use cachefront_client::Fetcher;
use cachefront_core::response::{ResponseSource, WorkerResponse};
use cachefront_core::storage::{self, CacheEntry, CacheStore};
use cachefront_core::{Error, WorkerRequest};

use crate::routes::{Route, Strategy};

/// Executes route policies against the store and the network.
#[derive(Clone)]
pub struct StrategyRunner {
    store: CacheStore,
    fetcher: Arc<dyn Fetcher>,
}

impl StrategyRunner {
    pub fn new(store: CacheStore, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Run a route's policy for a request.
    pub async fn run(&self, route: &Route, request: &WorkerRequest) -> Result<WorkerResponse, Error> {
        match route.strategy {
            Strategy::CacheFirst => self.cache_first(route, request).await,
            Strategy::NetworkFirst => self.network_first(route, request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(route, request).await,
        }
    }

    /// Fetch without touching any cache.
    pub async fn passthrough(&self, request: &WorkerRequest) -> Result<WorkerResponse, Error> {
        let fetched = self.fetcher.fetch(request).await?;
        Ok(fetched.into_response(ResponseSource::Network))
    }

    /// Serve from cache when present and unexpired, otherwise fetch and
    /// store. A transport failure with no cached entry propagates.
    async fn cache_first(&self, route: &Route, request: &WorkerRequest) -> Result<WorkerResponse, Error> {
        if let Some(entry) = self.fresh_entry(route, request).await? {
            tracing::debug!(cache = %route.cache, url = %request.url, "cache hit");
            return Ok(entry.into_response(ResponseSource::Cache));
        }

        let fetched = self.fetcher.fetch(request).await?;
        let response = fetched.into_response(ResponseSource::Network);
        self.store_if_cacheable(route, request, &response).await;
        Ok(response)
    }

    /// Prefer the live network; fall back to cache only on transport
    /// failure. An HTTP error status is a network success: it is returned
    /// as-is and simply fails the allow-list check.
    async fn network_first(&self, route: &Route, request: &WorkerRequest) -> Result<WorkerResponse, Error> {
        match self.fetcher.fetch(request).await {
            Ok(fetched) => {
                let response = fetched.into_response(ResponseSource::Network);
                self.store_if_cacheable(route, request, &response).await;
                Ok(response)
            }
            Err(err) => {
                tracing::debug!(cache = %route.cache, url = %request.url, error = %err, "network failed, trying cache");
                match self.fresh_entry(route, request).await? {
                    Some(entry) => Ok(entry.into_response(ResponseSource::Cache)),
                    None => Err(err),
                }
            }
        }
    }

    /// Serve the cached entry immediately and refresh it in a detached
    /// task; when nothing is cached, wait on the network.
    async fn stale_while_revalidate(&self, route: &Route, request: &WorkerRequest) -> Result<WorkerResponse, Error> {
        if let Some(entry) = self.fresh_entry(route, request).await? {
            let runner = self.clone();
            let route = route.clone();
            let request = request.clone();
            tokio::spawn(async move {
                runner.revalidate(&route, &request).await;
            });
            return Ok(entry.into_response(ResponseSource::Cache));
        }

        let fetched = self.fetcher.fetch(request).await?;
        let response = fetched.into_response(ResponseSource::Network);
        self.store_if_cacheable(route, request, &response).await;
        Ok(response)
    }

    /// Background refresh for stale-while-revalidate. The originating
    /// request already has its response, so every failure here is only
    /// logged.
    async fn revalidate(&self, route: &Route, request: &WorkerRequest) {
        match self.fetcher.fetch(request).await {
            Ok(fetched) => {
                let response = fetched.into_response(ResponseSource::Network);
                self.store_if_cacheable(route, request, &response).await;
            }
            Err(err) => {
                tracing::debug!(cache = %route.cache, url = %request.url, error = %err, "revalidation failed");
            }
        }
    }

    /// The cached entry for a request if it exists and is within the
    /// route's max-age. Expired entries are deleted and read as misses.
    async fn fresh_entry(&self, route: &Route, request: &WorkerRequest) -> Result<Option<CacheEntry>, Error> {
        let Some(entry) = self.store.get(&route.cache, request.url.as_str()).await? else {
            return Ok(None);
        };

        if let Some(max_age) = route.expiration.max_age
            && storage::is_expired(&entry.stored_at, max_age)
        {
            tracing::debug!(cache = %route.cache, url = %request.url, "entry expired");
            self.store.delete(&route.cache, request.url.as_str()).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Store a response if the route's allow-list admits its status, then
    /// enforce the route's eviction bounds.
    async fn store_if_cacheable(&self, route: &Route, request: &WorkerRequest, response: &WorkerResponse) {
        if !route.cacheable.allows(response.status) {
            tracing::debug!(cache = %route.cache, url = %request.url, status = response.status, "status not cacheable");
            return;
        }

        let entry = CacheEntry::from_response(&route.cache, request.url.as_str(), response);
        if let Err(err) = self.store.put(&entry).await {
            tracing::warn!(cache = %route.cache, url = %request.url, error = %err, "cache write failed");
            return;
        }

        self.enforce_expiration(route).await;
    }

    /// Apply the route's bounds after a write: purge over-age entries,
    /// then trim the oldest insertions down to the entry bound.
    async fn enforce_expiration(&self, route: &Route) {
        if let Some(max_age) = route.expiration.max_age
            && let Err(err) = self.store.purge_older_than(&route.cache, max_age).await
        {
            tracing::warn!(cache = %route.cache, error = %err, "age purge failed");
        }

        if let Some(max_entries) = route.expiration.max_entries
            && let Err(err) = self.store.trim_to(&route.cache, max_entries).await
        {
            tracing::warn!(cache = %route.cache, error = %err, "count trim failed");
        }
    }
}
