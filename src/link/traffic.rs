use thiserror::Error;

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

/// Marker placed before the download volume in every annotation.
const DOWNLOAD_MARKER: char = '↓';

/// Errors produced while reading a `subscription-userinfo` header.
///
/// These never escape [`annotate_traffic`]; they exist so the warning log
/// says what was wrong with the header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrafficParseError {
    /// The header value was empty or whitespace only
    #[error("usage header is empty")]
    Empty,
    /// A `;`-separated segment had no `=`
    #[error("malformed usage pair: {0:?}")]
    MalformedPair(String),
}

/// Builds a human-readable traffic annotation from a usage header.
///
/// The header looks like `upload=235205700; download=1883111384; total=0; expire=0`.
/// Only `download` is used. A missing or non-numeric `download` counts as zero.
///
/// Returns `""` (and logs a warning) when the header is structurally malformed,
/// so callers can append the result unconditionally.
///
/// ```
/// use submerge::link::annotate_traffic;
///
/// assert_eq!(annotate_traffic("upload=1; download=500; total=0"), "↓500B");
/// assert_eq!(annotate_traffic("garbage"), "");
/// ```
pub fn annotate_traffic(header_value: &str) -> String {
    match parse_download(header_value) {
        Ok(download) => format!("{DOWNLOAD_MARKER}{}", format_bytes(download)),
        Err(e) => {
            tracing::warn!(
                header = %header_value,
                error = %e,
                "Failed to parse subscription usage header"
            );
            String::new()
        }
    }
}

/// Scales a byte count to the largest binary unit it reaches.
///
/// `GB`, `MB` and `KB` carry two decimals; plain bytes are printed as an integer.
pub fn format_bytes(bytes: u64) -> String {
    // Precision loss above 2^53 bytes is irrelevant at two decimals of GB
    let value = bytes as f64;
    if bytes >= GIB {
        format!("{:.2}GB", value / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2}MB", value / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2}KB", value / KIB as f64)
    } else {
        format!("{bytes}B")
    }
}

fn parse_download(header_value: &str) -> Result<u64, TrafficParseError> {
    let trimmed = header_value.trim();
    if trimmed.is_empty() {
        return Err(TrafficParseError::Empty);
    }

    let mut download = 0;
    for pair in trimmed.split(';') {
        let pair = pair.trim();
        // Tolerate a trailing separator
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| TrafficParseError::MalformedPair(pair.to_owned()))?;
        if key.trim() == "download" {
            download = parse_amount(value.trim());
        }
    }

    Ok(download)
}

/// Panels occasionally report volumes as floats (`1.5e9`); anything else
/// that is not a non-negative number reads as zero.
fn parse_amount(value: &str) -> u64 {
    value
        .parse::<u64>()
        .ok()
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        })
        .unwrap_or(0)
}
