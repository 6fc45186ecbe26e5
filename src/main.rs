use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use ash::app::{api, App};
use ash::db::Database;
use ash::environment::Config;
use ash::logging::configure_logging;
use ash::rss::FeedFetcher;
use ash::scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "ash", version, about = "RSS/Atom feed ingestion service")]
struct Cli {
    /// SQLite database path; overrides DATABASE_PATH.
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the periodic fetch cycle (default).
    Serve,
    /// Run a single fetch cycle over every feed, print the report and exit.
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    let _guard = configure_logging(&config.log_dir);
    info!("Starting ash {}", ash::version());

    let db = Database::new(&config.database_path)
        .await
        .with_context(|| format!("failed to open database {}", config.database_path))?;
    let fetcher = FeedFetcher::new(config.fetch_timeout).context("failed to build HTTP client")?;
    let scheduler = Arc::new(Scheduler::new(
        db.clone(),
        fetcher.clone(),
        config.max_concurrent_fetches,
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Refresh => {
            let report = scheduler.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve => serve(config, db.clone(), fetcher, scheduler).await?,
    }

    db.close().await;
    Ok(())
}

async fn serve(
    config: Config,
    db: Database,
    fetcher: FeedFetcher,
    scheduler: Arc<Scheduler>,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Dropping the sender would read as a shutdown.
                error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    let scheduler_task = Arc::clone(&scheduler).spawn(config.fetch_interval, shutdown_rx.clone());

    let app = App::new(db, fetcher, scheduler, config.on_demand_timeout);
    let mut server_shutdown = shutdown_rx;
    api::serve(app, config.port, async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    })
    .await
    .with_context(|| format!("HTTP server on port {} failed", config.port))?;

    if let Err(e) = scheduler_task.await {
        error!("Scheduler task ended abnormally: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}
