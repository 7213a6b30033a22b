//! Cache key generation.
//!
//! Entries are keyed by the SHA-256 of the request URL, so lookups are
//! exact-URL matches and the key column stays fixed-width.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request URL.
pub fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
