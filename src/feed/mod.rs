//! Subscription feed retrieval and merging.
//!
//! - **Fetching**: one GET per subscription source, base64-decoded, with a short
//!   per-feed timeout. Failures are logged and carried as values, never raised.
//! - **Merging**: fans out over every source at once, waits for all of them,
//!   annotates each feed's links with its own traffic figure, then appends the
//!   direct links.
//!
//! # Example
//!
//! ```ignore
//! use submerge::feed::merge_all;
//!
//! let merged = merge_all(&sources, &direct_links, "subscriber", timeout).await?;
//! ```

mod fetcher;
mod merge;

pub(crate) use fetcher::read_limited_bytes;
pub use fetcher::{
    decode_feed_body, fetch_subscription, FetchError, FetchResult, FetchedFeed, Headers,
};
pub use merge::{
    merge_all, merge_with_client, pick_headers, MergeError, Merged, MERGED_HEADER_KEYS,
    USERINFO_HEADER,
};
