//! SQLite-backed Feed Store and Article Store.
//!
//! Both stores live on one [`Database`] handle; the feed operations are in
//! `feed.rs`, the article operations in `article.rs`.

mod article;
pub mod core;
mod feed;
mod schema;

pub use self::article::{Article, UpsertOutcome};
pub use self::core::{Database, DbErrorExt};
pub use self::feed::{Feed, FeedPatch, NewFeed};
