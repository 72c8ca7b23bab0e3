//! Per-link rewriting applied to every configuration line before it is served.
//!
//! - [`traffic`] - turns a `subscription-userinfo` header into a short `↓1.75GB` annotation
//! - [`name`] - strips the identity/expiry tag from a link's display name and appends
//!   the annotation
//!
//! Both entry points are total: malformed input degrades to a no-op and a warning log.

mod name;
mod traffic;

pub use name::{clean_link_name, CleanError};
pub use traffic::{annotate_traffic, format_bytes, TrafficParseError};
