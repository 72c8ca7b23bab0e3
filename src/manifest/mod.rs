//! The manifest: the list of subscription endpoints and direct links to serve.
//!
//! - [`source`] - loads raw lines from a local file or a remote (GitHub) file
//! - [`classify`] - splits those lines into subscription sources and direct links

mod classify;
mod source;

pub use classify::{classify, LinkSet, DIRECT_LINK_PREFIX, SUBSCRIPTION_PREFIX};
pub use source::{ManifestError, ManifestSource};
