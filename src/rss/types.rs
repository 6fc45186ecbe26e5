//! Type definitions for the RSS module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Duration;

/// Title stored for items (and feeds) that do not carry one.
pub const UNTITLED: &str = "Untitled";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Largest feed body accepted, both as received and after gzip inflation.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// An item as parsed from a fetch, not yet reconciled against storage.
///
/// The fallbacks are applied at parse time, so every field that takes part
/// in storage is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateArticle {
    /// Falls back to [`UNTITLED`].
    pub title: String,
    /// Falls back to the empty string; never absent since it is half of the
    /// dedup key.
    pub link: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    /// Falls back to the fetch time.
    pub publish_date: DateTime<Utc>,
}

/// A parsed feed document.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items: Vec<CandidateArticle>,
    pub fetched_at: DateTime<Utc>,
}
