//! CLI error type.

use thiserror::Error;

use nxlsync::logging::LoggingError;
use nxlsync::{HttpError, SettingsError, UpdateError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("failed to set signal handler: {0}")]
    Signal(String),

    /// The run finished but some entries are not up to date.
    #[error("{failed} file(s) failed to sync")]
    Incomplete { failed: usize },

    #[error("interrupted")]
    Interrupted,
}
