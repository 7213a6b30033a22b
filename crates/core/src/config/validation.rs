//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::generation::Generation;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `listen_addr` is not a socket address
    /// - `origin` is not an absolute http(s) URL
    /// - `generation` is empty or contains characters outside `[A-Za-z0-9._]`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - a precache path or the offline path is not origin-relative
    /// - the offline path is missing from `precache_paths`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "listen_addr".into(),
                reason: "must be a host:port socket address".into(),
            });
        }

        self.origin_url()?;

        if !Generation::is_valid_tag(&self.generation) {
            return Err(ConfigError::Invalid {
                field: "generation".into(),
                reason: "must be non-empty and limited to [A-Za-z0-9._]".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for path in &self.precache_paths {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field: "precache_paths".into(),
                    reason: format!("path must start with '/': {path}"),
                });
            }
        }

        if !self.offline_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "offline_path".into(),
                reason: "path must start with '/'".into(),
            });
        }

        if !self.precache_paths.contains(&self.offline_path) {
            return Err(ConfigError::Invalid {
                field: "offline_path".into(),
                reason: "must be listed in precache_paths, or the navigation fallback has nothing to serve".into(),
            });
        }

        let distinct: std::collections::HashSet<&String> = self.precache_paths.iter().collect();
        if distinct.len() != self.precache_paths.len() {
            tracing::warn!(
                listed = self.precache_paths.len(),
                distinct = distinct.len(),
                "precache_paths contains duplicates; \
                 the first occurrence of each path wins"
            );
        }

        Ok(())
    }
}
