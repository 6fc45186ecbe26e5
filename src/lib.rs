pub mod app;
pub mod db;
pub mod environment;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod rss;
pub mod scheduler;

pub use error::{Error, FetchError, FetchErrorKind};

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_SCHEDULER: &str = "scheduler";

/// Version string reported by the API and the CLI.
pub fn version() -> String {
    match option_env!("GIT_HASH") {
        Some(hash) => format!("{} ({})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}
