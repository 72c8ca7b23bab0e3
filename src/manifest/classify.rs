/// Lines starting with this are subscription endpoints.
pub const SUBSCRIPTION_PREFIX: &str = "http";
/// Lines starting with this are self-contained proxy links.
pub const DIRECT_LINK_PREFIX: &str = "vless://";

/// Manifest lines split by kind, each in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSet {
    /// Base URLs the subscriber id is appended to
    pub subscription_sources: Vec<String>,
    /// Inline links served without any fetch
    pub direct_links: Vec<String>,
}

impl LinkSet {
    /// True when the manifest held no usable line of either kind.
    pub fn is_empty(&self) -> bool {
        self.subscription_sources.is_empty() && self.direct_links.is_empty()
    }
}

/// Classifies manifest lines by their trimmed prefix.
///
/// The `http` check runs before the `vless://` check. Blank lines, comments
/// and anything else are dropped without a log entry. No URL validation
/// happens here.
pub fn classify<I, S>(lines: I) -> LinkSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut links = LinkSet::default();

    for line in lines {
        let line = line.as_ref().trim();
        if line.starts_with(SUBSCRIPTION_PREFIX) {
            links.subscription_sources.push(line.to_owned());
        } else if line.starts_with(DIRECT_LINK_PREFIX) {
            links.direct_links.push(line.to_owned());
        }
    }

    links
}
