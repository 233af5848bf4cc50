//! Process-wide `tracing` setup.
//!
//! Console output goes to stderr so stdout stays free for command output and
//! progress bars. An optional log file receives the same events without ANSI
//! colouring; its writer runs on a background thread kept alive by the
//! returned [`LoggingGuard`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, time::OffsetTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log file path {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("failed to open log file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Logging options.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Default to `debug` instead of `info` when `RUST_LOG` is unset.
    pub verbose: bool,
    /// Also write events to this file.
    pub log_file: Option<PathBuf>,
    /// Colour console output.
    pub ansi: bool,
}

/// Keeps the file writer alive; drop it last.
#[must_use]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Must be read before worker threads exist; falls back to UTC.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(offset, Rfc3339);

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(timer.clone())
        .with_target(false)
        .with_ansi(config.ansi);

    let (file_layer, file_guard) = match &config.log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_appender(path)?);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(timer)
                .with_ansi(false)
                .with_thread_names(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

fn open_appender(path: &Path) -> Result<RollingFileAppender, LoggingError> {
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let file_error = |reason: String| LoggingError::File {
        path: path.to_path_buf(),
        reason,
    };
    fs::create_dir_all(dir).map_err(|e| file_error(e.to_string()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .map_err(|e| file_error(e.to_string()))
}
