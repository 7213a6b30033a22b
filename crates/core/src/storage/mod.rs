//! SQLite-backed storage for named response caches.
//!
//! This module provides the persistent store behind the named caches using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - URL-keyed storage using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Per-cache eviction by age and by entry count

pub mod connection;
pub mod entries;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheStore;
pub use entries::{CacheEntry, is_expired, now_timestamp, timestamp_before};
pub use key::cache_key;
