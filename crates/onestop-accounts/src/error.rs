//! Account error types

use onestop_storage::StorageError;
use onestop_types::{BusinessId, UserId};
use thiserror::Error;

/// Account, session and team errors
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Phone already registered: {0}")]
    DuplicatePhone(String),

    #[error("SSM number already registered: {0}")]
    DuplicateSsm(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Phone number not verified")]
    PhoneUnverified,

    #[error("Session is missing or expired")]
    InvalidSession,

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Business not found: {0}")]
    BusinessNotFound(BusinessId),

    #[error("Invitation not found: {0}")]
    InvitationNotFound(String),

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invitation is {status}, expected pending")]
    InvitationNotPending { status: String },

    #[error("Invitation was issued to a different email address")]
    InvitationEmailMismatch,

    #[error("An invitation is already pending for {0}")]
    DuplicateInvitation(String),

    #[error("Already a member of this business: {0}")]
    AlreadyMember(String),

    #[error("Not a member of this business")]
    NotAMember,

    #[error("Operation not permitted: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for account operations
pub type AccountResult<T> = std::result::Result<T, AccountError>;
