//! Error types for the Kairos agent pipeline
//!
//! This module provides structured error definitions using thiserror. The
//! taxonomy separates failures the retry policy may absorb (transport and
//! malformed provider output) from storage failures, which always propagate.

use thiserror::Error;

/// Main error type for Kairos operations
#[derive(Error, Debug)]
pub enum KairosError {
    /// Network or HTTP failure talking to an external provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered but without a usable payload
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Persistence collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A bounded retry loop gave up
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl KairosError {
    /// Whether a bounded retry loop should try again after this error.
    ///
    /// Transport and malformed-response failures both mean "the provider did
    /// not give usable output" and are retried alike. Storage failures are
    /// never retried by the core.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KairosError::Transport(_) | KairosError::MalformedResponse(_) | KairosError::Http(_)
        )
    }
}

/// Result type alias for Kairos operations
pub type Result<T> = std::result::Result<T, KairosError>;

impl From<rusqlite::Error> for KairosError {
    fn from(err: rusqlite::Error) -> Self {
        KairosError::Storage(err.to_string())
    }
}

impl From<::config::ConfigError> for KairosError {
    fn from(err: ::config::ConfigError) -> Self {
        KairosError::Config(err.to_string())
    }
}

/// Convert anyhow::Error to KairosError
impl From<anyhow::Error> for KairosError {
    fn from(err: anyhow::Error) -> Self {
        KairosError::Other(err.to_string())
    }
}
