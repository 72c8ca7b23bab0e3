use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::str::Utf8Error;
use std::sync::LazyLock;
use thiserror::Error;

/// Characters left literal when re-encoding a display name: `A-Z a-z 0-9 - _ . ~`.
/// Every other byte, including `/`, is percent-encoded.
const FRAGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Subscriber identity and expiry tag that panels append to display names,
/// e.g. `-XYZ123-30D,5H⏳`. Must sit at the very end of the name.
static IDENTITY_TAG: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"-[A-Za-z0-9]+(?:-[0-9DHM,]+)?⏳?$"));

/// Errors that can occur while rewriting a link's display name.
#[derive(Debug, Error)]
pub enum CleanError {
    /// The fragment percent-decoded to bytes that are not UTF-8
    #[error("display name is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),
    /// The identity tag pattern failed to compile
    #[error("identity tag pattern unavailable: {0}")]
    Pattern(String),
}

/// Rewrites the display name (the part after the last `#`) of a proxy link.
///
/// The name is percent-decoded, stripped of a trailing identity/expiry tag,
/// optionally suffixed with `" " + traffic_suffix`, then percent-encoded again.
/// Links without a `#` are returned as-is.
///
/// On any failure the original link is returned unchanged and a warning is logged.
///
/// ```
/// use submerge::link::clean_link_name;
///
/// assert_eq!(clean_link_name("vless://abc#user-XYZ123-30D,5H⏳", ""), "vless://abc#user");
/// assert_eq!(clean_link_name("vless://abc#de", "↓1.75GB"), "vless://abc#de%20%E2%86%931.75GB");
/// ```
pub fn clean_link_name(link: &str, traffic_suffix: &str) -> String {
    let Some(hash) = link.rfind('#') else {
        return link.to_owned();
    };

    match rewrite_fragment(&link[hash + 1..], traffic_suffix) {
        Ok(fragment) => {
            let mut cleaned = String::with_capacity(hash + 1 + fragment.len());
            cleaned.push_str(&link[..=hash]);
            cleaned.push_str(&fragment);
            cleaned
        }
        Err(e) => {
            tracing::warn!(link = %link, error = %e, "Failed to clean link name, keeping original");
            link.to_owned()
        }
    }
}

fn rewrite_fragment(fragment: &str, traffic_suffix: &str) -> Result<String, CleanError> {
    let decoded = percent_decode_str(fragment).decode_utf8()?;
    let pattern = IDENTITY_TAG
        .as_ref()
        .map_err(|e| CleanError::Pattern(e.to_string()))?;

    let mut name = pattern.replace(&decoded, "").into_owned();
    if !traffic_suffix.is_empty() {
        name.push(' ');
        name.push_str(traffic_suffix);
    }

    Ok(utf8_percent_encode(&name, FRAGMENT_ENCODE_SET).to_string())
}
