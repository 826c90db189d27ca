//! Unified error handling for the matchwatch crate
//!
//! Workers classify every failure from the remote API or the store locally;
//! the variants here carry enough information to decide between retrying,
//! backing off until the quota window resets, or dropping the unit of work.

use std::io;
use thiserror::Error;

/// Unified error type for the matchwatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// The daily request budget (or a session cap) would be exceeded
    #[error("request quota exceeded")]
    QuotaExceeded,

    /// The remote rejected a createsession call
    #[error("session denied by remote: {0}")]
    SessionDenied(String),

    /// A bucket hit the abandon threshold and was permanently dropped
    #[error("bucket abandoned after {fails} failures: {key}")]
    BucketAbandoned { key: String, fails: u32 },

    /// Snapshot read/write failure; last good state remains authoritative
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Database errors on the match store path
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP client errors (transport, timeout, status)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote returned a payload we could not interpret
    #[error("unexpected API response: {0}")]
    ApiResponse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error is recoverable (the unit of work may be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::QuotaExceeded => true,
            Self::SessionDenied(_) => true,
            Self::Http(_) => true,
            Self::ApiResponse(_) => true,
            Self::Persistence(_) => true,
            Self::Database(_) => false,
            Self::BucketAbandoned { .. } => false,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
        }
    }

    /// True when the right response is to suspend until the quota window resets
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
