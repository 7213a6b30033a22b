//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CACHEFRONT_*)
//! 2. TOML config file (if CACHEFRONT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::generation::Generation;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CACHEFRONT_*)
/// 2. TOML config file (if CACHEFRONT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the gateway listens on.
    ///
    /// Set via CACHEFRONT_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Upstream origin same-origin requests are resolved against.
    ///
    /// Set via CACHEFRONT_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via CACHEFRONT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Current cache generation tag.
    ///
    /// Bumping this invalidates every versioned cache; activation deletes
    /// the previous generation's caches. Set via CACHEFRONT_GENERATION
    /// environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// User-Agent string for upstream HTTP requests.
    ///
    /// Set via CACHEFRONT_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via CACHEFRONT_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via CACHEFRONT_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Origin-relative paths fetched into the precache at install.
    ///
    /// Set via CACHEFRONT_PRECACHE_PATHS environment variable
    /// (comma-separated).
    #[serde(default = "default_precache_paths")]
    pub precache_paths: Vec<String>,

    /// Precached path served when a navigation cannot be satisfied.
    ///
    /// Set via CACHEFRONT_OFFLINE_PATH environment variable.
    #[serde(default = "default_offline_path")]
    pub offline_path: String,

    /// Filename suffix identifying the article index API.
    ///
    /// Set via CACHEFRONT_ARTICLES_INDEX environment variable.
    #[serde(default = "default_articles_index")]
    pub articles_index: String,

    /// Hosts serving font stylesheets.
    ///
    /// Set via CACHEFRONT_FONT_STYLESHEET_HOSTS environment variable
    /// (comma-separated).
    #[serde(default = "default_font_stylesheet_hosts")]
    pub font_stylesheet_hosts: Vec<String>,

    /// Hosts serving font files.
    ///
    /// Set via CACHEFRONT_FONT_FILE_HOSTS environment variable
    /// (comma-separated).
    #[serde(default = "default_font_file_hosts")]
    pub font_file_hosts: Vec<String>,

    /// CDN hosts for third-party script and style assets.
    ///
    /// Set via CACHEFRONT_CDN_HOSTS environment variable (comma-separated).
    #[serde(default = "default_cdn_hosts")]
    pub cdn_hosts: Vec<String>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./cachefront.sqlite")
}

fn default_generation() -> String {
    "1".into()
}

fn default_user_agent() -> String {
    "cachefront/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_precache_paths() -> Vec<String> {
    ["/", "/index.html", "/styles/common.css", "/scripts/common.js", "/offline.html"]
        .map(String::from)
        .to_vec()
}

fn default_offline_path() -> String {
    "/offline.html".into()
}

fn default_articles_index() -> String {
    "articles.json".into()
}

fn default_font_stylesheet_hosts() -> Vec<String> {
    vec!["fonts.googleapis.com".into()]
}

fn default_font_file_hosts() -> Vec<String> {
    vec!["fonts.gstatic.com".into()]
}

fn default_cdn_hosts() -> Vec<String> {
    vec!["cdnjs.cloudflare.com".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            origin: default_origin(),
            db_path: default_db_path(),
            generation: default_generation(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            precache_paths: default_precache_paths(),
            offline_path: default_offline_path(),
            articles_index: default_articles_index(),
            font_stylesheet_hosts: default_font_stylesheet_hosts(),
            font_file_hosts: default_font_file_hosts(),
            cdn_hosts: default_cdn_hosts(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured generation as a typed tag.
    pub fn current_generation(&self) -> Generation {
        Generation::new(self.generation.clone())
    }

    /// The upstream origin as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute
    /// http(s) URL. `validate` applies the same check at load time.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: "scheme must be http or https".into(),
            });
        }
        if url.host_str().is_none() {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "missing host".into() });
        }
        Ok(url)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CACHEFRONT_`
    /// 2. TOML file from `CACHEFRONT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CACHEFRONT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CACHEFRONT_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
