//! Reconciliation: merging fetched candidate articles into stored state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, Instrument};

use crate::db::{Database, Feed};
use crate::error::{Error, Result};
use crate::rss::{CandidateArticle, FeedFetcher};
use crate::{TARGET_DB, TARGET_SCHEDULER};

/// What one reconciliation did to a feed.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub feed_id: i64,
    pub inserted: usize,
    pub updated: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Upserts `candidates` for `feed_id` in source order, then marks the feed
/// fetched at `fetched_at`.
///
/// The freshness timestamp is only touched once every upsert has completed.
/// Nothing is retried here; a storage error aborts the run and leaves
/// `last_fetched` as it was.
pub async fn reconcile(
    db: &Database,
    feed_id: i64,
    candidates: &[CandidateArticle],
    fetched_at: DateTime<Utc>,
) -> Result<Reconciliation> {
    let mut inserted = 0;
    let mut updated = 0;

    for candidate in candidates {
        let outcome = db.upsert_article(feed_id, candidate).await?;
        if outcome.inserted {
            inserted += 1;
        } else {
            updated += 1;
        }
    }

    if !db.touch_fetched(feed_id, fetched_at).await? {
        // Deleted while we were working; its articles went with it.
        return Err(Error::not_found(format!("feed {} not found", feed_id)));
    }

    debug!(target: TARGET_DB, "Feed {}: {} inserted, {} updated", feed_id, inserted, updated);

    Ok(Reconciliation {
        feed_id,
        inserted,
        updated,
        fetched_at,
    })
}

/// Fetch + reconcile for one feed. A fetch failure is returned untouched
/// and leaves the stored feed and its articles exactly as they were.
pub async fn refresh_feed(db: &Database, fetcher: &FeedFetcher, feed: &Feed) -> Result<Reconciliation> {
    let span = info_span!("refresh_feed", feed_id = feed.id, url = %feed.url);
    async move {
        let fetched = fetcher.fetch(&feed.url).await.map_err(Error::Fetch)?;
        let result = reconcile(db, feed.id, &fetched.items, fetched.fetched_at).await?;
        info!(
            target: TARGET_SCHEDULER,
            "Refreshed feed {} ({}): {} new, {} updated",
            feed.id, feed.url, result.inserted, result.updated
        );
        Ok(result)
    }
    .instrument(span)
    .await
}
