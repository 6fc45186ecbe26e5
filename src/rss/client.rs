//! HTTP client creation and request handling for RSS feeds.

use reqwest::header;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::error::FetchError;
use crate::TARGET_WEB_REQUEST;

const ACCEPT_FEEDS: &str = "application/rss+xml, application/atom+xml, application/feed+json, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";

/// Builds the shared client. `request_timeout` is also enforced per call in
/// [`fetch_bytes`], this one only guards the connect phase.
pub fn create_http_client(request_timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(concat!("ash/", env!("CARGO_PKG_VERSION")))
        .gzip(true)
        .connect_timeout(request_timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(FetchError::Network)
}

fn map_request_error(err: reqwest::Error, request_timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(request_timeout)
    } else {
        FetchError::Network(err)
    }
}

/// GETs `url` and returns the body. The whole exchange, headers and body,
/// must complete within `request_timeout`, and the body must not exceed
/// `max_body_bytes`.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    request_timeout: Duration,
    max_body_bytes: usize,
) -> Result<Vec<u8>, FetchError> {
    debug!(target: TARGET_WEB_REQUEST, "Requesting {}", url);

    let exchange = async {
        let mut response = client
            .get(url)
            .header(header::ACCEPT, ACCEPT_FEEDS)
            .send()
            .await
            .map_err(|e| map_request_error(e, request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_request_error(e, request_timeout))?
        {
            if body.len() + chunk.len() > max_body_bytes {
                return Err(FetchError::Malformed(format!(
                    "response body exceeds {} bytes",
                    max_body_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    };

    match timeout(request_timeout, exchange).await {
        Ok(Ok(bytes)) => {
            debug!(target: TARGET_WEB_REQUEST, "Received {} bytes from {}", bytes.len(), url);
            Ok(bytes)
        }
        Ok(Err(err)) => Err(err),
        Err(_) => Err(FetchError::Timeout(request_timeout)),
    }
}
