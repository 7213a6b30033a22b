//! Cache entry CRUD operations.
//!
//! Provides functions for writing, reading, and evicting cached responses,
//! scoped per named cache.

use std::time::Duration;

use super::connection::CacheStore;
use super::key::cache_key;
use crate::Error;
use crate::generation::CacheName;
use crate::response::{ResponseSource, WorkerResponse};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Current time as an RFC 3339 UTC timestamp.
///
/// Timestamps use fixed-width microsecond precision so lexicographic order
/// on the `stored_at` column is chronological order.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// The timestamp `age` before now, in the same fixed-width format.
pub fn timestamp_before(age: Duration) -> String {
    let age = chrono::Duration::from_std(age).unwrap_or(chrono::Duration::MAX);
    let cutoff = chrono::Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
    cutoff.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Whether a `stored_at` timestamp is older than `max_age`.
pub fn is_expired(stored_at: &str, max_age: Duration) -> bool {
    stored_at < timestamp_before(max_age).as_str()
}

/// One cached response, keyed by cache name and request URL.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cache_name: String,
    pub key_hash: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CacheEntry {
    /// Build an entry from a response, stamped with the current time.
    pub fn from_response(cache: &CacheName, url: &str, response: &WorkerResponse) -> Self {
        Self {
            cache_name: cache.as_str().to_string(),
            key_hash: cache_key(url),
            url: url.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
            headers_json: serde_json::to_string(&response.headers).ok(),
            body: response.body.to_vec(),
            stored_at: now_timestamp(),
        }
    }

    /// Stored headers, or empty if the entry carries none.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.headers_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default()
    }

    /// Rehydrate the entry as a response attributed to `source`.
    pub fn into_response(self, source: ResponseSource) -> WorkerResponse {
        let headers = self.headers();
        WorkerResponse {
            status: self.status,
            content_type: self.content_type,
            headers,
            body: Bytes::from(self.body),
            source,
        }
    }
}

impl CacheStore {
    /// Insert or update a cached entry.
    ///
    /// Uses UPSERT semantics: inserts if the (cache, key) pair doesn't
    /// exist, replaces the stored response if it does. A replaced entry
    /// takes the new `stored_at`, so rewrites reset its age.
    pub async fn put(&self, entry: &CacheEntry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (
                        cache_name, key_hash, url, status, content_type, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(cache_name, key_hash) DO UPDATE SET
                        url = excluded.url,
                        status = excluded.status,
                        content_type = excluded.content_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &entry.cache_name,
                        &entry.key_hash,
                        &entry.url,
                        i64::from(entry.status),
                        &entry.content_type,
                        &entry.headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for a URL in a named cache.
    ///
    /// Returns None if the URL has not been cached there.
    pub async fn get(&self, cache: &CacheName, url: &str) -> Result<Option<CacheEntry>, Error> {
        let cache = cache.as_str().to_string();
        let key = cache_key(url);
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT cache_name, key_hash, url, status, content_type, headers_json, body, stored_at
                     FROM cache_entries WHERE cache_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![cache, key], |row| {
                    Ok(CacheEntry {
                        cache_name: row.get(0)?,
                        key_hash: row.get(1)?,
                        url: row.get(2)?,
                        status: row.get::<_, i64>(3)? as u16,
                        content_type: row.get(4)?,
                        headers_json: row.get(5)?,
                        body: row.get(6)?,
                        stored_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a URL is present in a named cache.
    pub async fn contains(&self, cache: &CacheName, url: &str) -> Result<bool, Error> {
        let cache = cache.as_str().to_string();
        let key = cache_key(url);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let present: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM cache_entries WHERE cache_name = ?1 AND key_hash = ?2)",
                        params![cache, key],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                Ok(present)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for a URL in a named cache.
    ///
    /// Returns true if an entry was removed.
    pub async fn delete(&self, cache: &CacheName, url: &str) -> Result<bool, Error> {
        let cache = cache.as_str().to_string();
        let key = cache_key(url);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE cache_name = ?1 AND key_hash = ?2",
                    params![cache, key],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a named cache.
    pub async fn count(&self, cache: &CacheName) -> Result<u64, Error> {
        let cache = cache.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
                    params![cache],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries in a named cache older than `max_age`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_older_than(&self, cache: &CacheName, max_age: Duration) -> Result<u64, Error> {
        let cache = cache.as_str().to_string();
        let cutoff = timestamp_before(max_age);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE cache_name = ?1 AND stored_at < ?2",
                    params![cache, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries in a named cache until count <= max_entries.
    ///
    /// Oldest means earliest `stored_at`, with insertion order (rowid)
    /// breaking ties. Returns the number of deleted entries.
    pub async fn trim_to(&self, cache: &CacheName, max_entries: u32) -> Result<u64, Error> {
        let cache = cache.as_str().to_string();
        let max = i64::from(max_entries);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
                    params![&cache],
                    |row| row.get(0),
                )?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE rowid IN (
                        SELECT rowid FROM cache_entries WHERE cache_name = ?1
                        ORDER BY stored_at ASC, rowid ASC LIMIT ?2
                    )",
                    params![&cache, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry in a named cache.
    ///
    /// Takes the raw name so activation can drop caches whose generation no
    /// longer parses against the current naming scheme.
    pub async fn delete_cache(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE cache_name = ?1", params![name])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// All cache names that currently hold at least one entry.
    pub async fn list_cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT DISTINCT cache_name FROM cache_entries ORDER BY cache_name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(Error::from)?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }
}
