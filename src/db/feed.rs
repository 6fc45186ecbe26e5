use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::{debug, instrument};

use super::core::{Database, DbErrorExt};
use crate::error::{Error, Result};
use crate::TARGET_DB;

/// A subscribed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    /// Time of the last successful fetch; `None` until the first one.
    pub last_fetched: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeed {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Partial update; `None` fields are left as stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPatch {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl FeedPatch {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.title.is_none() && self.description.is_none()
    }
}

fn map_feed_write_error(err: sqlx::Error, url: Option<&str>) -> Error {
    if err.is_unique_violation() {
        Error::Duplicate(format!(
            "a feed with url {} already exists",
            url.unwrap_or("<unknown>")
        ))
    } else {
        Error::Storage(err)
    }
}

impl Database {
    /// Inserts a feed with a null freshness timestamp.
    #[instrument(target = "db_query", level = "info", skip(self, title, description))]
    pub async fn create_feed(
        &self,
        url: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<Feed> {
        let now = Utc::now();
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (url, title, description, last_fetched, created_at, updated_at)
            VALUES (?1, ?2, ?3, NULL, ?4, ?4)
            RETURNING id, url, title, description, last_fetched, created_at, updated_at
            "#,
        )
        .bind(url)
        .bind(title)
        .bind(description)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_feed_write_error(e, Some(url)))?;

        debug!(target: TARGET_DB, "Created feed {} for {}", feed.id, url);
        Ok(feed)
    }

    pub async fn get_feed(&self, id: i64) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, description, last_fetched, created_at, updated_at
            FROM feeds WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(feed)
    }

    /// All feeds, newest-created first.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, description, last_fetched, created_at, updated_at
            FROM feeds
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(feeds)
    }

    /// Applies `patch` in a single statement. Returns `None` when `id` is
    /// unknown.
    #[instrument(target = "db_query", level = "info", skip(self, patch))]
    pub async fn update_feed(&self, id: i64, patch: &FeedPatch) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            UPDATE feeds SET
                url = COALESCE(?1, url),
                title = COALESCE(?2, title),
                description = COALESCE(?3, description),
                updated_at = ?4
            WHERE id = ?5
            RETURNING id, url, title, description, last_fetched, created_at, updated_at
            "#,
        )
        .bind(patch.url.as_deref())
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_feed_write_error(e, patch.url.as_deref()))?;
        Ok(feed)
    }

    /// Deletes a feed together with its articles (FK cascade). Returns
    /// `false` when nothing was deleted.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn delete_feed(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Records a successful fetch. Only `last_fetched` changes.
    pub async fn touch_fetched(&self, id: i64, fetched_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE feeds SET last_fetched = ?1 WHERE id = ?2")
            .bind(fetched_at)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
