#![allow(dead_code)]

use std::time::Duration;

use ash::db::Database;
use ash::rss::FeedFetcher;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds an RSS 2.0 document; each item is `(title, link)`.
pub fn rss(title: &str, items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link)| {
            format!(
                "<item><title>{}</title><link>{}</link><pubDate>Mon, 21 Oct 2024 07:28:00 GMT</pubDate></item>",
                title, link
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>{}</title><description>Test channel</description>{}</channel></rss>"#,
        title, items
    )
}

pub fn example_feed() -> String {
    rss(
        "Example Feed",
        &[
            ("First", "https://example.com/posts/1"),
            ("Second", "https://example.com/posts/2"),
        ],
    )
}

pub async fn serve_feed(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

pub async fn serve_status(server: &MockServer, at: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub async fn serve_slow_feed(server: &MockServer, at: &str, body: String, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

pub fn fetcher() -> FeedFetcher {
    FeedFetcher::new(Duration::from_secs(5)).unwrap()
}

pub async fn memory_db() -> Database {
    Database::in_memory().await.unwrap()
}
