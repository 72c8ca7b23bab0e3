use crate::config::Config;
use crate::feed::read_limited_bytes;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Media type asking GitHub's contents API for the raw file.
const GITHUB_RAW_ACCEPT: &str = "application/vnd.github.v3.raw";

const MAX_MANIFEST_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while loading the manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Remote manifest could not be fetched (network, timeout, non-2xx, no URL)
    #[error("Manifest unavailable: {0}")]
    Unavailable(String),
    /// Local manifest file could not be read
    #[error("Failed to read manifest file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the manifest lines come from.
#[derive(Debug)]
pub enum ManifestSource {
    /// A text file on local disk
    Local(PathBuf),
    /// A remote file, typically in a private GitHub repository
    Remote {
        url: Option<String>,
        token: Option<SecretString>,
        timeout: Duration,
    },
}

impl ManifestSource {
    /// Picks the source described by the configuration.
    pub fn from_config(config: &Config) -> Self {
        if config.local_mode {
            Self::Local(config.manifest_path.clone())
        } else {
            Self::Remote {
                url: config.manifest_url.clone(),
                token: config.github_token.clone().map(SecretString::from),
                timeout: config.manifest_timeout(),
            }
        }
    }

    /// Reads the manifest and returns its raw lines.
    ///
    /// # Errors
    ///
    /// - [`ManifestError::Io`] when the local file is missing or unreadable
    /// - [`ManifestError::Unavailable`] for any remote failure
    pub async fn load(&self) -> Result<Vec<String>, ManifestError> {
        let result = match self {
            Self::Local(path) => load_local(path).await,
            Self::Remote {
                url,
                token,
                timeout,
            } => {
                load_remote(url.as_deref(), token.as_ref(), *timeout, MAX_MANIFEST_SIZE).await
            }
        };

        match &result {
            Ok(lines) => tracing::debug!(lines = lines.len(), "Loaded manifest"),
            Err(e) => tracing::error!(error = %e, "Manifest load failed"),
        }
        result
    }
}

async fn load_local(path: &Path) -> Result<Vec<String>, ManifestError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(content.lines().map(str::to_owned).collect())
}

async fn load_remote(
    url: Option<&str>,
    token: Option<&SecretString>,
    timeout: Duration,
    max_size: usize,
) -> Result<Vec<String>, ManifestError> {
    let url = url.ok_or_else(|| ManifestError::Unavailable("no manifest URL configured".into()))?;

    // Dropped on return, so the connection pool lives only for this load
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ManifestError::Unavailable(e.to_string()))?;

    let mut request = client.get(url);
    if let Some(token) = token {
        request = request
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", token.expose_secret()),
            )
            .header(reqwest::header::ACCEPT, GITHUB_RAW_ACCEPT);
    }

    let response = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| ManifestError::Unavailable(e.to_string()))?;

    let raw = read_limited_bytes(response, max_size)
        .await
        .map_err(|e| ManifestError::Unavailable(e.to_string()))?;
    let text = String::from_utf8_lossy(&raw);

    Ok(text.lines().map(str::to_owned).collect())
}
