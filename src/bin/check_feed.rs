use anyhow::Result;
use ash::logging;
use ash::rss::FeedFetcher;
use ash::FetchErrorKind;
use colored::Colorize;
use std::env;
use std::process;
use std::time::Duration;

const SHOWN_ENTRIES: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_console_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        return Ok(());
    }

    let url = &args[1];
    let timeout_secs = args
        .iter()
        .position(|arg| arg == "--timeout")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(20);

    println!("Checking feed: {}", url);
    let fetcher = FeedFetcher::new(Duration::from_secs(timeout_secs))?;

    println!("\n{}", "═".repeat(100).bright_blue());
    println!("{}  {}", "FEED CHECK".bright_blue(), url.bright_yellow());
    println!("{}", "═".repeat(100).bright_blue());

    let feed = match fetcher.fetch(url).await {
        Ok(feed) => feed,
        Err(err) => {
            let kind = format!("{:?}", err.kind());
            let kind = match err.kind() {
                FetchErrorKind::Malformed => kind.bright_yellow(),
                FetchErrorKind::Network | FetchErrorKind::Timeout => kind.bright_red(),
            };
            println!("{}: {}", "Status".bright_blue(), kind);
            println!("{}: {}", "Error".bright_blue(), err.to_string().bright_red());
            println!("{}", "═".repeat(100).bright_blue());
            process::exit(1);
        }
    };

    println!("{}: {}", "Status".bright_blue(), "Ok".bright_green());
    println!(
        "{}: {}",
        "Title".bright_blue(),
        feed.title.as_deref().map_or("[No Title]".dimmed(), |t| t.bright_white())
    );
    if let Some(description) = &feed.description {
        println!("{}: {}", "Description".bright_blue(), description);
    }
    println!("{}: {}", "Entries Found".bright_blue(), feed.items.len());

    if !feed.items.is_empty() {
        println!("\n{}", "Feed Entries".bright_green());
        println!("{}", "─".repeat(80).dimmed());

        for (i, item) in feed.items.iter().take(SHOWN_ENTRIES).enumerate() {
            let link = if item.link.is_empty() {
                "[No URL]".dimmed()
            } else {
                item.link.bright_cyan()
            };
            println!(
                "{}. {} ({})\n   {}",
                i + 1,
                item.title.bright_white(),
                item.publish_date.to_rfc3339().dimmed(),
                link
            );
            if let Some(author) = &item.author {
                println!("   by {}", author);
            }
        }

        if feed.items.len() > SHOWN_ENTRIES {
            println!("... and {} more entries", feed.items.len() - SHOWN_ENTRIES);
        }
    }

    println!("\n{}", "═".repeat(100).bright_blue());
    Ok(())
}

fn print_usage(program_name: &str) {
    println!("Usage: {} <feed_url> [--timeout <seconds>]", program_name);
    println!("\nFetches and parses a feed without storing anything.");
    println!("\nOptions:");
    println!("  --timeout <seconds>    Request timeout (default 20)");
}
