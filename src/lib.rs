//! Merges proxy subscription feeds and direct links into one base64 subscription.
//!
//! A request flows through:
//!
//! 1. [`manifest`] - load the manifest and split it into feed URLs and direct links
//! 2. [`feed`] - fetch every feed concurrently and merge the results
//! 3. [`link`] - clean each link's display name and tag it with traffic usage
//! 4. [`aggregate`] - tie the above together and base64-encode the result
//! 5. [`server`] - expose it over HTTP

pub mod aggregate;
pub mod config;
pub mod feed;
pub mod link;
pub mod logging;
pub mod manifest;
pub mod server;

pub use aggregate::{aggregate, Aggregate, AggregateError};
pub use config::{Config, ConfigError};
