//! Application service: the operations the HTTP layer exposes, composed from
//! the stores, the fetcher, the reconciliation engine and the scheduler.

pub mod api;

use std::sync::Arc;

use tokio::time::{timeout, Duration};
use tracing::{info, info_span, Instrument};

use crate::db::{Article, Database, Feed, FeedPatch, NewFeed};
use crate::error::{Error, FetchError, Result};
use crate::reconcile::refresh_feed;
use crate::rss::{is_valid_url, FeedFetcher, UNTITLED};
use crate::scheduler::Scheduler;
use crate::TARGET_WEB_REQUEST;

#[derive(Clone)]
pub struct App {
    db: Database,
    fetcher: FeedFetcher,
    scheduler: Arc<Scheduler>,
    on_demand_timeout: Duration,
}

impl App {
    pub fn new(
        db: Database,
        fetcher: FeedFetcher,
        scheduler: Arc<Scheduler>,
        on_demand_timeout: Duration,
    ) -> Self {
        Self {
            db,
            fetcher,
            scheduler,
            on_demand_timeout,
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Registers a feed after confirming its source parses. No articles are
    /// stored here; the first fetch does that.
    pub async fn add_feed(&self, new: NewFeed) -> Result<Feed> {
        let url = validate_url(&new.url)?;

        let fetched = self.fetcher.fetch(url).await.map_err(Error::InvalidFeed)?;

        let title = given(new.title)
            .or(fetched.title)
            .unwrap_or_else(|| UNTITLED.to_string());
        let description = given(new.description).or(fetched.description);

        let feed = self
            .db
            .create_feed(url, &title, description.as_deref())
            .await?;
        info!(target: TARGET_WEB_REQUEST, "Added feed {} ({})", feed.id, feed.url);
        Ok(feed)
    }

    pub async fn get_feed(&self, id: i64) -> Result<Feed> {
        self.db
            .get_feed(id)
            .await?
            .ok_or_else(|| feed_not_found(id))
    }

    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        self.db.list_feeds().await
    }

    pub async fn update_feed(&self, id: i64, mut patch: FeedPatch) -> Result<Feed> {
        if patch.is_empty() {
            return self.get_feed(id).await;
        }
        if let Some(url) = patch.url.take() {
            patch.url = Some(validate_url(&url)?.to_string());
        }
        self.db
            .update_feed(id, &patch)
            .await?
            .ok_or_else(|| feed_not_found(id))
    }

    pub async fn delete_feed(&self, id: i64) -> Result<()> {
        if self.db.delete_feed(id).await? {
            info!(target: TARGET_WEB_REQUEST, "Deleted feed {}", id);
            Ok(())
        } else {
            Err(feed_not_found(id))
        }
    }

    /// On-demand fetch + reconcile of one feed, bounded by the on-demand
    /// timeout. Runs beside the background scheduler without waiting for it.
    /// Returns every stored article of the feed afterwards, newest first.
    pub async fn fetch_feed(&self, id: i64) -> Result<Vec<Article>> {
        let feed = self.get_feed(id).await?;
        let limit = self.on_demand_timeout;

        let refresh = refresh_feed(&self.db, &self.fetcher, &feed)
            .instrument(info_span!("on_demand_fetch", feed_id = id));
        match timeout(limit, refresh).await {
            Ok(result) => result?,
            Err(_) => return Err(Error::Fetch(FetchError::Timeout(limit))),
        };
        self.db.list_articles(id).await
    }

    pub async fn list_articles(&self, feed_id: i64) -> Result<Vec<Article>> {
        if self.db.get_feed(feed_id).await?.is_none() {
            return Err(feed_not_found(feed_id));
        }
        self.db.list_articles(feed_id).await
    }
}

fn feed_not_found(id: i64) -> Error {
    Error::not_found(format!("feed {} not found", id))
}

fn validate_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::validation("url must not be empty"));
    }
    if !is_valid_url(url) {
        return Err(Error::validation(format!(
            "url must be an absolute http(s) URL: {}",
            url
        )));
    }
    Ok(url)
}

/// Request fields that are present but blank count as absent.
fn given(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert_eq!(validate_url("  https://example.com/rss ").unwrap(), "https://example.com/rss");
        assert!(matches!(validate_url(""), Err(Error::Validation(_))));
        assert!(matches!(validate_url("   "), Err(Error::Validation(_))));
        assert!(matches!(validate_url("ftp://example.com/rss"), Err(Error::Validation(_))));
        assert!(matches!(validate_url("example.com/rss"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_blank_request_fields_are_absent() {
        assert_eq!(given(Some("  ".into())), None);
        assert_eq!(given(Some("Title".into())), Some("Title".into()));
        assert_eq!(given(None), None);
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_network_or_storage() {
        let db = Database::in_memory().await.unwrap();
        let fetcher = FeedFetcher::default();
        let scheduler = Arc::new(Scheduler::new(db.clone(), fetcher.clone(), 1));
        let app = App::new(db.clone(), fetcher, scheduler, Duration::from_secs(5));

        let err = app
            .add_feed(NewFeed {
                url: "not a url".into(),
                title: None,
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(db.list_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_feed_operations_are_not_found() {
        let db = Database::in_memory().await.unwrap();
        let fetcher = FeedFetcher::default();
        let scheduler = Arc::new(Scheduler::new(db.clone(), fetcher.clone(), 1));
        let app = App::new(db, fetcher, scheduler, Duration::from_secs(5));

        assert!(matches!(app.get_feed(1).await, Err(Error::NotFound(_))));
        assert!(matches!(app.delete_feed(1).await, Err(Error::NotFound(_))));
        assert!(matches!(app.fetch_feed(1).await, Err(Error::NotFound(_))));
        assert!(matches!(app.list_articles(1).await, Err(Error::NotFound(_))));
        assert!(matches!(
            app.update_feed(1, FeedPatch::default()).await,
            Err(Error::NotFound(_))
        ));
    }
}
