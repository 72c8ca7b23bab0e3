//! One full aggregation: manifest → classification → merge → base64.

use crate::config::Config;
use crate::feed::{merge_all, Headers, MergeError};
use crate::manifest::{classify, ManifestError, ManifestSource};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Errors that reach the HTTP boundary.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Response-ready subscription for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Base64 (standard, padded) of the merged configuration lines
    pub payload: String,
    /// Allow-listed headers of the first successful feed
    pub headers: Headers,
}

/// Builds the merged subscription for `subscriber_id`.
///
/// The manifest is read fresh on every call; nothing is cached between requests.
///
/// # Errors
///
/// - [`AggregateError::Manifest`] if the manifest cannot be loaded
/// - [`MergeError::NothingToAggregate`] if the manifest has no usable line,
///   or every feed failed and there are no direct links
pub async fn aggregate(config: &Config, subscriber_id: &str) -> Result<Aggregate, AggregateError> {
    let lines = ManifestSource::from_config(config).load().await?;
    let links = classify(&lines);

    if links.is_empty() {
        tracing::error!(lines = lines.len(), "No subscriptions or configurations available");
        return Err(MergeError::NothingToAggregate.into());
    }

    tracing::debug!(
        sources = links.subscription_sources.len(),
        direct = links.direct_links.len(),
        "Classified manifest"
    );

    let merged = merge_all(
        &links.subscription_sources,
        &links.direct_links,
        subscriber_id,
        config.feed_timeout(),
    )
    .await?;

    Ok(Aggregate {
        payload: STANDARD.encode(&merged.payload),
        headers: merged.headers,
    })
}
