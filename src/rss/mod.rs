//! Feed retrieval and parsing.
//!
//! [`FeedFetcher`] turns a URL into a [`FetchedFeed`]: the HTTP side lives in
//! `client.rs`, the document handling in `parser.rs`.

mod client;
mod fetcher;
mod parser;
mod types;
mod util;

pub use self::client::create_http_client;
pub use self::fetcher::FeedFetcher;
pub use self::parser::parse_feed;
pub use self::types::*;
pub use self::util::{cleanup_xml, is_valid_url};
