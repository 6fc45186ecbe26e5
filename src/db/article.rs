use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sqlx::FromRow;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument};

use super::core::{Database, DbErrorExt};
use crate::error::{Error, Result};
use crate::rss::CandidateArticle;
use crate::TARGET_DB;

const MAX_LOCK_RETRIES: u32 = 5;

/// A persisted item, unique on `(feed_id, link)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub publish_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a single upsert.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub article: Article,
    /// `true` when the row did not exist before this call.
    pub inserted: bool,
}

#[derive(FromRow)]
struct UpsertedRow {
    #[sqlx(flatten)]
    article: Article,
    revision: i64,
}

impl Database {
    /// Inserts or refreshes the article keyed on `(feed_id, candidate.link)`
    /// in one atomic statement.
    ///
    /// On conflict the mutable fields (title, description, content, author,
    /// updated_at) are overwritten; id, created_at and publish_date are kept.
    /// The `revision` counter is what tells an insert from an update, so
    /// concurrent callers racing on one key still see exactly one insert.
    #[instrument(target = "db_query", level = "debug", skip(self, candidate), fields(link = %candidate.link))]
    pub async fn upsert_article(
        &self,
        feed_id: i64,
        candidate: &CandidateArticle,
    ) -> Result<UpsertOutcome> {
        let now = Utc::now();
        let mut backoff: u64 = 50; // initial delay in milliseconds

        for attempt in 1..=MAX_LOCK_RETRIES {
            let result = sqlx::query_as::<_, UpsertedRow>(
                r#"
                INSERT INTO articles (feed_id, title, link, description, content, author, publish_date, created_at, updated_at, revision)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, 1)
                ON CONFLICT(feed_id, link) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    content = excluded.content,
                    author = excluded.author,
                    updated_at = excluded.updated_at,
                    revision = articles.revision + 1
                RETURNING id, feed_id, title, link, description, content, author, publish_date, created_at, updated_at, revision
                "#,
            )
            .bind(feed_id)
            .bind(&candidate.title)
            .bind(&candidate.link)
            .bind(candidate.description.as_deref())
            .bind(candidate.content.as_deref())
            .bind(candidate.author.as_deref())
            .bind(candidate.publish_date)
            .bind(now)
            .fetch_one(self.pool())
            .await;

            match result {
                Ok(row) => {
                    let inserted = row.revision == 1;
                    debug!(target: TARGET_DB, "Article {} {} (revision {})", row.article.id,
                        if inserted { "inserted" } else { "updated" }, row.revision);
                    return Ok(UpsertOutcome {
                        article: row.article,
                        inserted,
                    });
                }
                Err(err) if err.is_foreign_key_violation() => {
                    return Err(Error::not_found(format!("feed {} not found", feed_id)));
                }
                Err(err) if err.is_database_lock_error() => {
                    // Randomise to avoid every writer waking up together.
                    let jitter = rand::rng().random_range(0..50);
                    info!(target: TARGET_DB, "Database is locked, waiting {}ms before retrying attempt {}/{}",
                        backoff + jitter, attempt, MAX_LOCK_RETRIES);
                    sleep(Duration::from_millis(backoff + jitter)).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => {
                    error!(target: TARGET_DB, "Failed to upsert article {}: {}", candidate.link, err);
                    return Err(Error::Storage(err));
                }
            }
        }

        Err(Error::Storage(sqlx::Error::Protocol(
            "maximum retries exceeded for upserting article".into(),
        )))
    }

    /// Articles of one feed, newest publish date first.
    pub async fn list_articles(&self, feed_id: i64) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, feed_id, title, link, description, content, author, publish_date, created_at, updated_at
            FROM articles
            WHERE feed_id = ?1
            ORDER BY publish_date DESC, id DESC
            "#,
        )
        .bind(feed_id)
        .fetch_all(self.pool())
        .await?;
        Ok(articles)
    }

    pub async fn count_articles(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}
