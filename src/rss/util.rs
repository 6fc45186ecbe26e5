//! Utility functions for RSS feed processing.

use std::io::Read;

use tracing::debug;

use crate::error::FetchError;
use crate::TARGET_WEB_REQUEST;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Helper function to validate a URL: absolute, http or https, with a host.
pub fn is_valid_url(url: &str) -> bool {
    match url::Url::parse(url.trim()) {
        Ok(parsed) => {
            (parsed.scheme() == "http" || parsed.scheme() == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

/// Clean up malformed XML
pub fn cleanup_xml(xml: &str) -> String {
    let mut cleaned = xml.trim().trim_start_matches('\u{FEFF}').to_string();

    // Drop anything before the document proper.
    if let Some(xml_start) = cleaned.find("<?xml") {
        cleaned = cleaned[xml_start..].to_string();
    } else if let Some(rss_start) = cleaned.find("<rss") {
        cleaned = cleaned[rss_start..].to_string();
    } else if let Some(rdf_start) = cleaned.find("<rdf:RDF") {
        cleaned = cleaned[rdf_start..].to_string();
    } else if let Some(feed_start) = cleaned.find("<feed") {
        cleaned = cleaned[feed_start..].to_string();
    }

    // HTML entities that are undefined in XML
    cleaned = cleaned
        .replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&rsquo;", "&#8217;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rdquo;", "&#8221;")
        .replace("&ldquo;", "&#8220;")
        .replace("&hellip;", "&#8230;")
        .replace("&amp;amp;", "&amp;");

    cleaned = cleaned
        .chars()
        .filter(|&c| {
            matches!(c,
                '\u{0009}' | // tab
                '\u{000A}' | // newline
                '\u{000D}' | // carriage return
                '\u{0020}'..='\u{D7FF}' |
                '\u{E000}'..='\u{FFFD}' |
                '\u{10000}'..='\u{10FFFF}'
            )
        })
        .collect();

    if !cleaned.starts_with("<?xml") {
        cleaned = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", cleaned);
    }

    cleaned
}

/// Inflates a gzip body that arrived without a `Content-Encoding` header.
/// Anything else is returned untouched. Inflating past `limit` bytes is an
/// error.
pub fn maybe_gunzip(bytes: &[u8], limit: usize) -> Result<Vec<u8>, FetchError> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }

    let mut decoder = flate2::read::GzDecoder::new(bytes).take(limit as u64 + 1);
    let mut decoded = Vec::new();
    if decoder.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
        if decoded.len() > limit {
            return Err(FetchError::Malformed(format!(
                "gzip body inflates past {} bytes",
                limit
            )));
        }
        debug!(target: TARGET_WEB_REQUEST, "Inflated {} gzip bytes to {}", bytes.len(), decoded.len());
        Ok(decoded)
    } else {
        debug!(target: TARGET_WEB_REQUEST, "Gzip magic present but inflate failed, using raw bytes");
        Ok(bytes.to_vec())
    }
}

/// Heuristic used before attempting a cleanup pass.
pub fn looks_like_feed(text: &str) -> bool {
    text.contains("<rss") || text.contains("<feed") || text.contains("<rdf:RDF")
}

/// Printable preview of a body for log messages.
pub fn preview(text: &str) -> String {
    if text.chars().all(|c| !c.is_control() || c.is_whitespace()) {
        text.chars().take(100).collect()
    } else {
        "[binary data]".to_string()
    }
}
