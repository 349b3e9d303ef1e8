//! Error types for the installation pipeline.
//!
//! Every stage surfaces its failure through [`InstallError`]; nothing retries
//! internally except the downloader's single alternate-mechanism attempt and
//! the extraction engine's strategy cascade. The orchestrator is the only
//! place errors are converted into a user-facing outcome.

use thiserror::Error;

/// Errors that can occur while acquiring and installing a package.
#[derive(Error, Debug)]
pub enum InstallError {
    /// Transport failure, timeout, or a non-success HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The repository, release, or requested ref does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The downloaded file is not a plausible archive.
    #[error("archive validation failed: {0}")]
    Validation(String),

    /// Every extraction strategy was tried and none succeeded.
    #[error("all extraction strategies exhausted for '{archive}'")]
    ExtractionFailed {
        archive: String,
        attempts: Vec<String>,
    },

    /// A filesystem mutation failed or left a post-condition unmet.
    #[error("storage error: {0}")]
    Storage(String),

    /// The extracted tree could not be resolved to a recognizable package.
    #[error("ambiguous package layout: {0}")]
    AmbiguousLayout(String),
}

impl From<std::io::Error> for InstallError {
    fn from(err: std::io::Error) -> Self {
        InstallError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for InstallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InstallError::Network(format!("request timed out: {}", err))
        } else {
            InstallError::Network(err.to_string())
        }
    }
}

/// Result type for installation operations.
pub type InstallResult<T> = Result<T, InstallError>;
