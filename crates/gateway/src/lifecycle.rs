//! Install and activate phases of the worker lifecycle.
//!
//! Install walks the precache manifest and fills the generation's precache
//! cache, skipping entries that are already present. Activate deletes every
//! versioned cache whose generation tag differs from the current one;
//! shared caches carry no tag and are never touched.

use cachefront_client::Fetcher;
use cachefront_core::response::ResponseSource;
use cachefront_core::storage::{CacheEntry, CacheStore};
use cachefront_core::{CacheName, Error, Generation, PrecacheManifest, WorkerRequest};

/// Outcome of an install pass over the precache manifest.
#[derive(Debug)]
pub struct InstallReport {
    pub requested: usize,
    pub precached: usize,
    pub already_present: usize,
    pub failed: Vec<PrecacheFailure>,
}

#[derive(Debug)]
pub struct PrecacheFailure {
    pub url: String,
    pub reason: String,
}

/// Fill the current generation's precache from the manifest.
///
/// Fetch failures and non-200 statuses are recorded per entry and do not
/// abort the pass; storage failures do.
pub async fn install(
    store: &CacheStore,
    fetcher: &dyn Fetcher,
    manifest: &PrecacheManifest,
    generation: &Generation,
) -> Result<InstallReport, Error> {
    let precache = CacheName::precache(generation);
    let mut report = InstallReport { requested: manifest.len(), precached: 0, already_present: 0, failed: Vec::new() };

    for entry in manifest.entries() {
        // within a generation the manifest is fixed, so a present entry is current
        if store.contains(&precache, entry.url.as_str()).await? {
            report.already_present += 1;
            continue;
        }

        let request = WorkerRequest::get(entry.url.clone());
        match fetcher.fetch(&request).await {
            Ok(fetched) if fetched.status == 200 => {
                let response = fetched.into_response(ResponseSource::Network);
                let cached = CacheEntry::from_response(&precache, entry.url.as_str(), &response);
                store.put(&cached).await?;
                report.precached += 1;
            }
            Ok(fetched) => {
                report.failed.push(PrecacheFailure { url: entry.url.to_string(), reason: format!("status {}", fetched.status) });
            }
            Err(err) => {
                report.failed.push(PrecacheFailure { url: entry.url.to_string(), reason: err.to_string() });
            }
        }
    }

    if report.failed.is_empty() {
        tracing::info!(cache = %precache, requested = report.requested, precached = report.precached, already_present = report.already_present, "precache installed");
    } else {
        for failure in &report.failed {
            tracing::warn!(url = %failure.url, reason = %failure.reason, "precache entry failed");
        }
        tracing::warn!(cache = %precache, requested = report.requested, precached = report.precached, failed = report.failed.len(), "precache installed with failures");
    }

    Ok(report)
}

/// Caches deleted during activation.
#[derive(Debug)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
}

/// Delete every versioned cache from a generation other than `current`.
pub async fn activate(store: &CacheStore, current: &Generation) -> Result<ActivationReport, Error> {
    let mut report = ActivationReport { deleted: Vec::new() };

    for name in store.list_cache_names().await? {
        if CacheName::is_stale(&name, current) {
            let entries = store.delete_cache(&name).await?;
            tracing::info!(cache = %name, entries, "deleted stale cache");
            report.deleted.push(name);
        }
    }

    Ok(report)
}
