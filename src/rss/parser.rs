//! Feed parsing logic for RSS, Atom, RDF and JSON Feed documents.

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed, Link};
use feed_rs::parser;
use tracing::{debug, warn};

use super::types::{CandidateArticle, FetchedFeed, MAX_BODY_BYTES, UNTITLED};
use super::util::{cleanup_xml, looks_like_feed, maybe_gunzip, preview};
use crate::error::FetchError;
use crate::TARGET_WEB_REQUEST;

/// Parses a raw feed document.
///
/// Individual items are never rejected: missing or unusable fields get
/// their fallback values (see [`CandidateArticle`]). Only a body that cannot
/// be read as a feed at all, even after a cleanup pass, is an error.
pub fn parse_feed(body: &[u8], fetched_at: DateTime<Utc>) -> Result<FetchedFeed, FetchError> {
    let body = maybe_gunzip(body, MAX_BODY_BYTES)?;

    let feed = match parser::parse(&body[..]) {
        Ok(feed) => feed,
        Err(first_err) => {
            let text = String::from_utf8_lossy(&body);
            if !looks_like_feed(&text) {
                debug!(target: TARGET_WEB_REQUEST, "Not a feed document: {}", preview(&text));
                return Err(FetchError::Malformed(format!(
                    "not RSS or Atom ({}), content preview: {}",
                    first_err,
                    preview(&text)
                )));
            }

            let cleaned = cleanup_xml(&text);
            match parser::parse(cleaned.as_bytes()) {
                Ok(feed) => {
                    warn!(target: TARGET_WEB_REQUEST, "Feed parsed only after XML cleanup: {}", first_err);
                    feed
                }
                Err(second_err) => {
                    return Err(FetchError::Malformed(format!(
                        "failed to parse feed even after cleanup. First error: {}. Second error: {}",
                        first_err, second_err
                    )));
                }
            }
        }
    };

    Ok(into_fetched_feed(feed, fetched_at))
}

fn into_fetched_feed(feed: Feed, fetched_at: DateTime<Utc>) -> FetchedFeed {
    let items: Vec<CandidateArticle> = feed
        .entries
        .into_iter()
        .map(|entry| candidate_from_entry(entry, fetched_at))
        .collect();

    debug!(target: TARGET_WEB_REQUEST, "Parsed feed with {} entries", items.len());

    FetchedFeed {
        title: feed.title.and_then(|t| non_blank(t.content)),
        description: feed.description.and_then(|t| non_blank(t.content)),
        items,
        fetched_at,
    }
}

fn candidate_from_entry(entry: Entry, fetched_at: DateTime<Utc>) -> CandidateArticle {
    let link = pick_link(&entry.links).unwrap_or_default();

    CandidateArticle {
        title: entry
            .title
            .and_then(|t| non_blank(t.content))
            .unwrap_or_else(|| UNTITLED.to_string()),
        link,
        description: entry.summary.and_then(|t| non_blank(t.content)),
        content: entry.content.and_then(|c| c.body).and_then(non_blank),
        author: entry.authors.into_iter().find_map(|p| non_blank(p.name)),
        publish_date: entry.published.or(entry.updated).unwrap_or(fetched_at),
    }
}

/// The article's canonical URL: an `alternate` (or rel-less) link when
/// present, otherwise whatever link comes first. Blank hrefs are skipped.
fn pick_link(links: &[Link]) -> Option<String> {
    let usable: Vec<&Link> = links.iter().filter(|l| !l.href.trim().is_empty()).collect();
    usable
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| usable.first())
        .and_then(|l| non_blank(l.href.clone()))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example Feed</title>
    <link>https://example.com/</link>
    <description>All the examples</description>
    <item>
      <title>First post</title>
      <link>https://example.com/1</link>
      <description>First summary</description>
      <content:encoded><![CDATA[<p>First body</p>]]></content:encoded>
      <dc:creator>Jane Doe</dc:creator>
      <pubDate>Mon, 21 Oct 2024 07:28:00 GMT</pubDate>
    </item>
    <item>
      <title>Second post</title>
      <link>https://example.com/2</link>
      <pubDate>Mon, 21 Oct 2024 08:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss() {
        let feed = parse_feed(RSS.as_bytes(), fetched_at()).unwrap();

        assert_eq!(feed.title.as_deref(), Some("Example Feed"));
        assert_eq!(feed.description.as_deref(), Some("All the examples"));
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title, "First post");
        assert_eq!(first.link, "https://example.com/1");
        assert_eq!(first.description.as_deref(), Some("First summary"));
        assert_eq!(first.content.as_deref(), Some("<p>First body</p>"));
        assert_eq!(first.author.as_deref(), Some("Jane Doe"));
        assert_eq!(
            first.publish_date,
            Utc.with_ymd_and_hms(2024, 10, 21, 7, 28, 0).unwrap()
        );

        // Source order is preserved.
        assert_eq!(feed.items[1].link, "https://example.com/2");
        assert!(feed.items[1].description.is_none());
    }

    #[test]
    fn test_parse_atom() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2024-12-13T18:30:02Z</updated>
  <entry>
    <title>Atom entry</title>
    <link rel="self" href="https://example.com/self/1"/>
    <link rel="alternate" href="https://example.com/atom/1"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2024-12-13T18:30:02Z</updated>
    <author><name>John</name></author>
    <summary>Some text.</summary>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes(), fetched_at()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Atom Example"));
        assert_eq!(feed.items.len(), 1);

        let entry = &feed.items[0];
        assert_eq!(entry.link, "https://example.com/atom/1");
        assert_eq!(entry.author.as_deref(), Some("John"));
        // No <published>: the entry's updated time is used.
        assert_eq!(
            entry.publish_date,
            Utc.with_ymd_and_hms(2024, 12, 13, 18, 30, 2).unwrap()
        );
    }

    #[test]
    fn test_blank_alternate_link_falls_through() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2024-12-13T18:30:02Z</updated>
  <entry>
    <title>Blank alternate</title>
    <link rel="alternate" href="  "/>
    <link rel="related" href="https://example.com/related/1"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6b</id>
    <updated>2024-12-13T18:30:02Z</updated>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes(), fetched_at()).unwrap();
        assert_eq!(feed.items[0].link, "https://example.com/related/1");
    }

    #[test]
    fn test_missing_fields_get_fallbacks() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Sparse</title>
    <item>
      <description>Only a description</description>
    </item>
    <item>
      <title>   </title>
      <link>https://example.com/bad-date</link>
      <pubDate>the day after tomorrow</pubDate>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes(), fetched_at()).unwrap();
        assert_eq!(feed.items.len(), 2);

        let bare = &feed.items[0];
        assert_eq!(bare.title, UNTITLED);
        assert_eq!(bare.link, "");
        assert_eq!(bare.publish_date, fetched_at());
        assert_eq!(bare.description.as_deref(), Some("Only a description"));

        let bad_date = &feed.items[1];
        assert_eq!(bad_date.title, UNTITLED);
        assert_eq!(bad_date.publish_date, fetched_at());
    }

    #[test]
    fn test_empty_channel_is_valid() {
        let rss = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;
        let feed = parse_feed(rss.as_bytes(), fetched_at()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Quiet"));
        assert!(feed.items.is_empty());
    }

    #[test]
    fn test_html_page_is_malformed() {
        let html = "<!DOCTYPE html><html><body><h1>Not a feed</h1></body></html>";
        let err = parse_feed(html.as_bytes(), fetched_at()).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = parse_feed(b"\x00\x01\x02 definitely not xml", fetched_at()).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_html_entities_are_recovered() {
        let rss = "<rss version=\"2.0\"><channel><title>Cafe&nbsp;News</title>\
                   <item><title>One&mdash;two</title><link>https://example.com/e</link></item>\
                   </channel></rss>";
        let feed = parse_feed(rss.as_bytes(), fetched_at()).unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].link, "https://example.com/e");
    }

    #[test]
    fn test_gzip_body_without_header() {
        use std::io::Write;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(RSS.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let feed = parse_feed(&compressed, fetched_at()).unwrap();
        assert_eq!(feed.items.len(), 2);
    }
}
