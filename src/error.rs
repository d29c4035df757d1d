//! Error types for relaychat
//!
//! This module defines the error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for relaychat operations
///
/// The upstream variants describe failures of the language-model call and
/// are mapped to distinct caller-visible signals by the API surface.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session store errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The model API could not be reached or refused the request
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The model API did not answer within the configured time
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// The model stream broke after it had started
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Missing credentials for an external service
    #[error("Missing credentials for {0}")]
    MissingCredentials(String),

    /// Errors talking to the relaychat API from the client
    #[error("Client error: {0}")]
    Client(String),
}

impl RelayError {
    /// Classify a reqwest failure raised while opening a model request
    pub fn from_upstream_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::UpstreamTimeout(err.to_string())
        } else {
            RelayError::UpstreamUnavailable(err.to_string())
        }
    }

    /// Short machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "config",
            RelayError::Storage(_) => "storage",
            RelayError::UpstreamUnavailable(_) => "upstream_unavailable",
            RelayError::UpstreamTimeout(_) => "upstream_timeout",
            RelayError::StreamInterrupted(_) => "stream_interrupted",
            RelayError::MissingCredentials(_) => "missing_credentials",
            RelayError::Client(_) => "client",
        }
    }
}

/// Result type alias for relaychat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
