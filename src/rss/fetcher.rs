//! Feed Fetcher: URL in, parsed candidate articles out.

use chrono::Utc;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::client::{create_http_client, fetch_bytes};
use super::parser::parse_feed;
use super::types::{FetchedFeed, DEFAULT_REQUEST_TIMEOUT, MAX_BODY_BYTES};
use crate::error::FetchError;
use crate::TARGET_WEB_REQUEST;

/// Retrieves and parses feed documents. Cloning shares the underlying
/// connection pool.
#[derive(Clone, Debug)]
pub struct FeedFetcher {
    client: reqwest::Client,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl FeedFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_http_client(request_timeout)?,
            request_timeout,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Fetches `url` and parses it. Fallbacks for items without a date use
    /// the moment the body was received.
    pub async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        debug!(target: TARGET_WEB_REQUEST, "Loading feed from {}", url);

        let body = match fetch_bytes(&self.client, url, self.request_timeout, self.max_body_bytes).await {
            Ok(body) => body,
            Err(err) => {
                warn!(target: TARGET_WEB_REQUEST, "Request to {} failed: {}", url, err);
                return Err(err);
            }
        };

        let fetched = parse_feed(&body, Utc::now())?;
        info!(target: TARGET_WEB_REQUEST, "Fetched {} ({} items)", url, fetched.items.len());
        Ok(fetched)
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}
