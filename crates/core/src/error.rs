//! Unified error type shared across the workspace.

use tokio_rusqlite::rusqlite;

/// Errors surfaced by the cache store, the network client, and the router.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cache store operation failed.
    #[error("cache store error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Schema migration failed to apply.
    #[error("cache store migration failed: {0}")]
    MigrationFailed(String),

    /// A URL could not be parsed or resolved.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Network transport failure (connection, TLS, timeout).
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Response body exceeded the configured size limit.
    #[error("fetch too large: {0}")]
    FetchTooLarge(String),
}

impl Error {
    /// True for failures of the cache store itself, as opposed to network
    /// or input errors. The worker falls back to passthrough on these.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
