//! Core types and shared functionality for cachefront.
//!
//! This crate provides:
//! - Named-cache storage with SQLite backend
//! - Request/response types and cache naming for the routing layer
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod generation;
pub mod manifest;
pub mod request;
pub mod response;
pub mod storage;

pub use config::AppConfig;
pub use error::Error;
pub use generation::{CacheName, Generation};
pub use manifest::{PrecacheEntry, PrecacheManifest};
pub use request::{Destination, RequestMode, WorkerRequest};
pub use response::{ResponseSource, WorkerResponse};
pub use storage::{CacheEntry, CacheStore};
