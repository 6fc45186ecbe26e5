use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_STDOUT_FILTER: &str = "info,web_request=info,db_query=warn,scheduler=info,sqlx=off";
const DEFAULT_FILE_FILTER: &str = "info,web_request=debug,db_query=info,scheduler=debug,sqlx=warn";

/// Installs the global subscriber: stdout honours `RUST_LOG`, the daily
/// rolling file in `log_dir` always records at the more verbose file filter.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn configure_logging(log_dir: &Path) -> WorkerGuard {
    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_STDOUT_FILTER));
    let stdout_log = fmt::layer().with_writer(io::stdout).with_filter(stdout_filter);

    let file_appender = rolling::daily(log_dir, "ash.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_log = fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new(DEFAULT_FILE_FILTER));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();

    guard
}

/// Stdout-only logging for the short-lived diagnostic tools.
pub fn configure_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::Registry::default()
        .with(fmt::layer().with_writer(io::stderr).with_filter(filter))
        .init();
}
