// src/error.rs
//! Error types at the library seams. Everything above these seams degrades
//! instead of propagating (see `sources`, `similarity`, `cache`).

use thiserror::Error;

/// Why a legislative source contributed nothing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source timed out")]
    Timeout,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("no results")]
    NoResults,
}

impl SourceError {
    /// Short, stable label for logs/metrics/diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Timeout => "timeout",
            SourceError::Http(e) if e.is_timeout() => "timeout",
            SourceError::Http(_) => "http",
            SourceError::Status(_) => "status",
            SourceError::Malformed(_) => "malformed",
            SourceError::NoResults => "no_results",
        }
    }

    /// "No results" is a normal outcome, not a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, SourceError::NoResults)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}
