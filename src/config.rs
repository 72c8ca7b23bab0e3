//! Configuration file parser for `submerge.toml`, with environment overrides.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
//!
//! Environment variables (usually from `.env`) take precedence over the file.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// An environment override could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    /// Feed timeout is zero or not shorter than the manifest timeout.
    #[error("feed_timeout_secs ({feed}) must be non-zero and below manifest_timeout_secs ({manifest})")]
    InvalidTimeouts { feed: u64, manifest: u64 },

    /// Route path cannot be mounted as a literal route.
    #[error("Invalid route path {0:?}: {1}")]
    InvalidRoutePath(String, &'static str),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `github_token` to prevent secret leakage
/// in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub listen_addr: String,

    /// Path segment the subscription is served under (`/{route_path}/{sub_id}`).
    pub route_path: String,

    /// Display name sent as `profile-title` and download filename.
    pub sub_name: String,

    /// Subscriber id used when the request path carries none.
    pub default_sub_id: String,

    /// Read the manifest from `manifest_path` instead of `manifest_url`.
    pub local_mode: bool,

    /// Local manifest file.
    pub manifest_path: PathBuf,

    /// Remote manifest URL.
    pub manifest_url: Option<String>,

    /// Token for private GitHub repositories (alternative to GITHUB_TOKEN env var).
    pub github_token: Option<String>,

    /// Timeout for the manifest fetch, in seconds.
    pub manifest_timeout_secs: u64,

    /// Timeout for each subscription feed fetch, in seconds.
    pub feed_timeout_secs: u64,

    /// Write logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            route_path: "sub".to_string(),
            sub_name: "submerge".to_string(),
            default_sub_id: String::new(),
            local_mode: false,
            manifest_path: PathBuf::from("configs.txt"),
            manifest_url: None,
            github_token: None,
            manifest_timeout_secs: 6,
            feed_timeout_secs: 3,
            log_file: None,
        }
    }
}

/// Mask github_token in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("route_path", &self.route_path)
            .field("sub_name", &self.sub_name)
            .field("default_sub_id", &self.default_sub_id)
            .field("local_mode", &self.local_mode)
            .field("manifest_path", &self.manifest_path)
            .field("manifest_url", &self.manifest_url)
            .field(
                "github_token",
                &self.github_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("manifest_timeout_secs", &self.manifest_timeout_secs)
            .field("feed_timeout_secs", &self.feed_timeout_secs)
            .field("log_file", &self.log_file)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "listen_addr",
        "route_path",
        "sub_name",
        "default_sub_id",
        "local_mode",
        "manifest_path",
        "manifest_url",
        "github_token",
        "manifest_timeout_secs",
        "feed_timeout_secs",
        "log_file",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {} // Size is within limits, proceed
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), route = %config.route_path, "Loaded configuration");
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    ///
    /// | Variable        | Field            |
    /// |-----------------|------------------|
    /// | `LOCAL_MODE`    | `local_mode` (`on` enables, anything else disables) |
    /// | `CONFIG_URL`    | `manifest_url`   |
    /// | `GITHUB_TOKEN`  | `github_token`   |
    /// | `URL`           | `route_path`     |
    /// | `SUB_NAME`      | `sub_name`       |
    /// | `SUB_ID`        | `default_sub_id` |
    /// | `LISTEN_ADDR`   | `listen_addr`    |
    /// | `LOG_FILE`      | `log_file`       |
    /// | `MANIFEST_TIMEOUT_SECS` | `manifest_timeout_secs` |
    /// | `FEED_TIMEOUT_SECS`     | `feed_timeout_secs`     |
    ///
    /// Empty values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LOCAL_MODE") {
            self.local_mode = v.trim().eq_ignore_ascii_case("on");
        }
        if let Some(v) = get("CONFIG_URL") {
            self.manifest_url = Some(v);
        }
        if let Some(v) = get("GITHUB_TOKEN") {
            self.github_token = Some(v);
        }
        if let Some(v) = get("URL") {
            self.route_path = v;
        }
        if let Some(v) = get("SUB_NAME") {
            self.sub_name = v;
        }
        if let Some(v) = get("SUB_ID") {
            self.default_sub_id = v;
        }
        if let Some(v) = get("LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = get("LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MANIFEST_TIMEOUT_SECS") {
            self.manifest_timeout_secs = parse_secs("MANIFEST_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = get("FEED_TIMEOUT_SECS") {
            self.feed_timeout_secs = parse_secs("FEED_TIMEOUT_SECS", v)?;
        }

        Ok(())
    }

    /// Checks cross-field constraints once the file and env layers are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed_timeout_secs == 0 || self.feed_timeout_secs >= self.manifest_timeout_secs {
            return Err(ConfigError::InvalidTimeouts {
                feed: self.feed_timeout_secs,
                manifest: self.manifest_timeout_secs,
            });
        }
        validate_route_path(&self.route_path)
    }

    /// Timeout for the one-off manifest load.
    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    /// Timeout for each individual feed fetch.
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }
}

/// The router mounts `route_path` verbatim, so it must not contain
/// parameter or wildcard syntax.
fn validate_route_path(route: &str) -> Result<(), ConfigError> {
    let invalid = |reason| Err(ConfigError::InvalidRoutePath(route.to_owned(), reason));
    if route.contains(['{', '}']) {
        return invalid("braces are not allowed");
    }
    if route
        .trim_matches('/')
        .split('/')
        .any(|segment| segment.starts_with([':', '*']))
    {
        return invalid("segments must not start with ':' or '*'");
    }
    if route.trim_matches('/').contains("//") {
        return invalid("empty segments are not allowed");
    }
    Ok(())
}

fn parse_secs(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

// ============================================================================
// Tests
// ============================================================================
