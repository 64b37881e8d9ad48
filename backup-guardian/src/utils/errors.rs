//! Error types for the backup guardian.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardianError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote API rejected the bearer token (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Refresh cycle failed: {0}")]
    Cycle(String),
}

impl GuardianError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GuardianError::Unauthorized(_))
    }
}

pub type Result<T> = std::result::Result<T, GuardianError>;
