//! cachefront gateway entry point.
//!
//! Boots the worker (store, precache install, stale-generation cleanup)
//! and serves the caching front on the configured address. Logging goes
//! to stderr so stdout stays free for the process supervisor.

use std::sync::Arc;

use anyhow::Result;
use cachefront_client::{FetchConfig, Fetcher, HttpFetcher};
use cachefront_core::config::AppConfig;
use tracing_subscriber::EnvFilter;

mod lifecycle;
mod routes;
mod serve;
mod strategy;
#[cfg(test)]
mod testing;
mod worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.origin_url()?;
    tracing::info!(origin = %origin, generation = %config.generation, db = %config.db_path.display(), "starting cachefront gateway");

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(FetchConfig::from_app(&config, origin))?);
    let worker = worker::Worker::bootstrap(&config, fetcher).await?;
    if worker.is_degraded() {
        tracing::warn!("cache store unavailable, every request will be fetched from the origin");
    }

    let app = serve::router(Arc::new(worker));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
