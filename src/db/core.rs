use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use std::str::FromStr;
use tokio::time::Duration;
use tracing::{info, instrument};

use crate::TARGET_DB;

/// Handle to the persistence substrate. Cheap to clone; all clones share
/// one connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

/// Classification helpers for the errors SQLite hands back.
pub trait DbErrorExt {
    /// SQLITE_BUSY / SQLITE_LOCKED, including their extended codes.
    fn is_database_lock_error(&self) -> bool;
    fn is_unique_violation(&self) -> bool;
    fn is_foreign_key_violation(&self) -> bool;
}

impl DbErrorExt for sqlx::Error {
    fn is_database_lock_error(&self) -> bool {
        match self {
            sqlx::Error::Database(err) => err
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map_or(false, |code| matches!(code & 0xff, 5 | 6)),
            _ => false,
        }
    }

    fn is_unique_violation(&self) -> bool {
        matches!(self, sqlx::Error::Database(err) if err.is_unique_violation())
    }

    fn is_foreign_key_violation(&self) -> bool {
        matches!(self, sqlx::Error::Database(err) if err.is_foreign_key_violation())
    }
}

impl Database {
    #[instrument(target = "db_query", level = "info")]
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        info!(target: TARGET_DB, "Creating database pool for: {}", database_path);

        let connect_options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        info!(target: TARGET_DB, "Database pool created");

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// A private in-memory database. The pool holds exactly one connection
    /// that is never recycled, since each SQLite memory connection is its
    /// own database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
