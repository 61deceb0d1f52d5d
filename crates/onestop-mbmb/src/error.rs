//! MBMB client error types

use thiserror::Error;

/// Errors surfaced by the MBMB API client
#[derive(Debug, Error)]
pub enum MbmbError {
    /// Client-credential exchange was refused
    #[error("MBMB authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A 2xx response carried a body we could not decode
    #[error("Invalid MBMB response: {0}")]
    Decode(String),

    /// Non-2xx response from the council API
    #[error("MBMB API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Upstream error message, or the raw body when not JSON
        message: String,
    },
}

/// Result type for MBMB operations
pub type MbmbResult<T> = Result<T, MbmbError>;
