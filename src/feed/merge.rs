use crate::feed::fetcher::{fetch_subscription, FetchedFeed, Headers};
use crate::link::{annotate_traffic, clean_link_name};
use futures::future::join_all;
use std::time::Duration;
use thiserror::Error;

/// Usage accounting header; also the source of each feed's traffic annotation.
pub const USERINFO_HEADER: &str = "subscription-userinfo";

/// Headers copied from the first successful feed into the merged response.
pub const MERGED_HEADER_KEYS: [&str; 3] = [
    USERINFO_HEADER,
    "profile-update-interval",
    "profile-web-page-url",
];

/// Errors that stop an aggregation.
#[derive(Debug, Error)]
pub enum MergeError {
    /// No feed succeeded and there are no direct links
    #[error("There is nothing to return")]
    NothingToAggregate,
    /// The HTTP client for the feed batch could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Combined, not yet base64-encoded output of one aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Merged {
    /// Cleaned subscription lines followed by cleaned direct links
    pub payload: Vec<u8>,
    /// Allow-listed headers of the first successful feed
    pub headers: Headers,
}

/// Fetches every subscription source concurrently and merges the results
/// with the direct links.
///
/// A fresh HTTP client is built for the batch and dropped before returning.
///
/// # Errors
///
/// - [`MergeError::NothingToAggregate`] if every fetch failed and `direct_links` is empty
/// - [`MergeError::Client`] if the HTTP client cannot be constructed
pub async fn merge_all(
    subscription_sources: &[String],
    direct_links: &[String],
    subscriber_id: &str,
    feed_timeout: Duration,
) -> Result<Merged, MergeError> {
    let client = reqwest::Client::builder().build()?;
    merge_with_client(
        &client,
        subscription_sources,
        direct_links,
        subscriber_id,
        feed_timeout,
    )
    .await
}

/// [`merge_all`] over a caller-supplied client.
///
/// # Errors
///
/// Returns [`MergeError::NothingToAggregate`] if every fetch failed and
/// `direct_links` is empty.
pub async fn merge_with_client(
    client: &reqwest::Client,
    subscription_sources: &[String],
    direct_links: &[String],
    subscriber_id: &str,
    feed_timeout: Duration,
) -> Result<Merged, MergeError> {
    // All fetches run at once; join_all keeps manifest order and waits for every one
    let results = join_all(
        subscription_sources
            .iter()
            .map(|source| fetch_subscription(client, source, subscriber_id, feed_timeout)),
    )
    .await;

    let total = results.len();
    let feeds: Vec<FetchedFeed> = results.into_iter().filter_map(|r| r.result.ok()).collect();

    if feeds.is_empty() {
        if direct_links.is_empty() {
            tracing::error!(sources = total, "No subscriptions or configurations available");
            return Err(MergeError::NothingToAggregate);
        }
        tracing::warn!(sources = total, "No subscriptions available");
    } else if feeds.len() < total {
        tracing::info!(
            succeeded = feeds.len(),
            failed = total - feeds.len(),
            "Some subscriptions were skipped"
        );
    }

    let headers = feeds.first().map(|f| pick_headers(&f.headers)).unwrap_or_default();
    let payload = merge_payload(&feeds, direct_links);

    Ok(Merged { payload, headers })
}

/// Copies the allow-listed headers; missing keys stay missing.
pub fn pick_headers(headers: &Headers) -> Headers {
    MERGED_HEADER_KEYS
        .iter()
        .filter_map(|key| headers.get(*key).map(|v| ((*key).to_owned(), v.clone())))
        .collect()
}

/// Concatenates cleaned feed bodies and then the cleaned direct links.
///
/// Bodies keep their own trailing newline; a newline is added between two
/// bodies only when the first lacks one. Nothing is inserted between the
/// last body and the direct links.
fn merge_payload(feeds: &[FetchedFeed], direct_links: &[String]) -> Vec<u8> {
    let mut payload = Vec::new();

    for feed in feeds {
        let suffix = feed
            .headers
            .get(USERINFO_HEADER)
            .map(|value| annotate_traffic(value))
            .unwrap_or_default();
        let body = clean_body(&feed.body, &suffix);

        if !payload.is_empty() && !payload.ends_with(b"\n") {
            payload.push(b'\n');
        }
        payload.extend_from_slice(body.as_bytes());
    }

    let links: Vec<String> = direct_links
        .iter()
        .map(|link| clean_link_name(link, ""))
        .collect();
    payload.extend_from_slice(links.join("\n").as_bytes());

    payload
}

/// Cleans every line of a decoded feed body with the feed's own annotation.
fn clean_body(body: &[u8], traffic_suffix: &str) -> String {
    let text = String::from_utf8_lossy(body);
    let mut cleaned = text
        .lines()
        .map(|line| clean_link_name(line, traffic_suffix))
        .collect::<Vec<_>>()
        .join("\n");
    if text.ends_with('\n') {
        cleaned.push('\n');
    }
    cleaned
}
