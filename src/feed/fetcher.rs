use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Standard alphabet, padding optional. Panels differ on whether they pad.
const FEED_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Response headers keyed by lowercase header name.
pub type Headers = BTreeMap<String, String>;

/// Errors that can occur while fetching a single subscription feed.
///
/// None of these abort an aggregation; the feed is simply left out.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request and body read exceeded the feed timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body is not valid base64
    #[error("Invalid base64 body: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// A successfully fetched and decoded feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFeed {
    /// Decoded feed body, normally newline-separated links
    pub body: Vec<u8>,
    /// Every response header; non-UTF-8 bytes in values are replaced
    pub headers: Headers,
}

/// Result of a single feed fetch.
///
/// Carries the source URL for correlation and either the decoded feed or
/// the error that occurred.
#[derive(Debug)]
pub struct FetchResult {
    /// Source URL as listed in the manifest (without the subscriber id)
    pub source: String,
    /// Decoded feed, or the error that occurred
    pub result: Result<FetchedFeed, FetchError>,
}

/// Fetches one subscription feed for a subscriber.
///
/// The request target is `source` with `subscriber_id` appended verbatim;
/// callers are responsible for the id being URL-safe. The whole exchange,
/// body included, must finish within `timeout`.
///
/// Never fails: errors are logged as warnings and returned inside
/// [`FetchResult::result`].
pub async fn fetch_subscription(
    client: &reqwest::Client,
    source: &str,
    subscriber_id: &str,
    timeout: Duration,
) -> FetchResult {
    let target = format!("{source}{subscriber_id}");

    let result = match tokio::time::timeout(timeout, fetch_one(client, &target)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    };

    match &result {
        Ok(feed) => {
            tracing::info!(
                source = %target,
                headers = ?feed.headers,
                bytes = feed.body.len(),
                "Fetched subscription"
            );
        }
        Err(e) => {
            tracing::warn!(source = %target, error = %e, "Can't get subscription");
        }
    }

    FetchResult {
        source: source.to_owned(),
        result,
    }
}

async fn fetch_one(client: &reqwest::Client, target: &str) -> Result<FetchedFeed, FetchError> {
    let response = client.get(target).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let headers = collect_headers(response.headers());
    let raw = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    let body = decode_feed_body(&raw)?;

    Ok(FetchedFeed { body, headers })
}

/// Decodes a base64 feed body, ignoring any ASCII whitespace around or inside it.
pub fn decode_feed_body(raw: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    FEED_ENGINE.decode(compact)
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> Headers {
    headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_owned(), value)
        })
        .collect()
}

pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
