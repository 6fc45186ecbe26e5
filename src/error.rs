//! Error taxonomy shared by the stores, the fetcher and the API.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a fetch failure, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Network,
    Timeout,
    Malformed,
}

/// Failure to retrieve or parse a feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("document is not a valid feed: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network(_) | FetchError::Status(_) => FetchErrorKind::Network,
            FetchError::Timeout(_) => FetchErrorKind::Timeout,
            FetchError::Malformed(_) => FetchErrorKind::Malformed,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input; never reaches storage.
    #[error("{0}")]
    Validation(String),

    /// A feed URL (or another natural key) is already taken.
    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    NotFound(String),

    /// The source given to add-feed could not be fetched or parsed.
    #[error("invalid feed: {0}")]
    InvalidFeed(#[source] FetchError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Duplicate(_) => "duplicate",
            Error::NotFound(_) => "not_found",
            Error::InvalidFeed(_) => "invalid_feed",
            Error::Fetch(e) => match e.kind() {
                FetchErrorKind::Network => "fetch_network",
                FetchErrorKind::Timeout => "fetch_timeout",
                FetchErrorKind::Malformed => "fetch_malformed",
            },
            Error::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
