//! Notification and OTP error types

use crate::senders::SendError;
use onestop_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by notification and OTP operations
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Request failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A challenge for this phone was issued too recently
    #[error("An OTP was sent recently; retry in {retry_in_secs}s")]
    CooldownActive { retry_in_secs: i64 },

    /// No live challenge for the phone, or it passed its TTL
    #[error("OTP challenge expired or not found")]
    Expired,

    /// The submitted code does not match the challenge
    #[error("Incorrect OTP code")]
    InvalidCode,

    /// The challenge was consumed by too many wrong codes
    #[error("Too many incorrect attempts; request a new OTP")]
    TooManyAttempts,

    /// Outbound delivery failed
    #[error("Delivery failed: {0}")]
    Send(#[from] SendError),

    /// Storage layer failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for notification operations
pub type NotifyResult<T> = Result<T, NotifyError>;
