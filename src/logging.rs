//! Log file output with rotation.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::rolling::{Builder, InitError, RollingFileAppender, Rotation};

/// Rotated log files kept next to the active one.
pub const MAX_LOG_FILES: usize = 5;

#[derive(Debug, Error)]
pub enum LogFileError {
    #[error("Log file path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("Failed to open log file {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: InitError,
    },
}

/// Builds a daily-rotating appender for `path`.
///
/// Files are written as `<file name>.<date>` in the parent directory of
/// `path`; only the newest [`MAX_LOG_FILES`] are kept.
pub fn rolling_file(path: &Path) -> Result<RollingFileAppender, LogFileError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = path
        .file_name()
        .ok_or_else(|| LogFileError::NoFileName(path.to_path_buf()))?
        .to_string_lossy()
        .into_owned();

    Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|source| LogFileError::Init {
            path: path.to_path_buf(),
            source,
        })
}
