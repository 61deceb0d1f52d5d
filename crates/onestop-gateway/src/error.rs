//! Error types for the gateway daemon.
//!
//! Service crates surface their own thiserror enums; this module folds them
//! into one `ApiError` whose `IntoResponse` impl fixes the HTTP status and
//! machine-readable code for every failure the API can emit.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use onestop_accounts::AccountError;
use onestop_billing::BillingError;
use onestop_documents::DocumentError;
use onestop_notify::NotifyError;
use onestop_review::ReviewError;
use onestop_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors raised during boot and serving
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup or serving error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-facing errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request shape is valid but its content is not
    #[error("Validation error: {0}")]
    Validation(String),

    /// A fee must be settled before the operation can proceed
    #[error("Payment required: {0}")]
    PaymentRequired(String),

    /// Rate limit or cooldown in force
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// The council API or a delivery provider failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::PaymentRequired(_) => (StatusCode::PAYMENT_REQUIRED, "PAYMENT_REQUIRED"),
            ApiError::TooManyRequests(_) => (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

fn storage_error(err: StorageError) -> ApiError {
    match err {
        StorageError::NotFound(msg) => ApiError::NotFound(msg),
        StorageError::Conflict(msg) => ApiError::Conflict(msg),
        StorageError::InvalidInput(msg) => ApiError::Validation(msg),
        other => ApiError::Internal(other.to_string()),
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        storage_error(err)
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        let message = err.to_string();
        match err {
            AccountError::DuplicateEmail(_)
            | AccountError::DuplicatePhone(_)
            | AccountError::DuplicateSsm(_)
            | AccountError::DuplicateInvitation(_)
            | AccountError::AlreadyMember(_)
            | AccountError::InvitationExpired
            | AccountError::InvitationNotPending { .. } => ApiError::Conflict(message),
            AccountError::InvalidCredentials | AccountError::InvalidSession => {
                ApiError::Unauthorized(message)
            }
            AccountError::PhoneUnverified
            | AccountError::InvitationEmailMismatch
            | AccountError::NotAMember
            | AccountError::Forbidden(_) => ApiError::Forbidden(message),
            AccountError::UserNotFound(_)
            | AccountError::BusinessNotFound(_)
            | AccountError::InvitationNotFound(_) => ApiError::NotFound(message),
            AccountError::InvalidInput(_) => ApiError::Validation(message),
            AccountError::Storage(err) => storage_error(err),
        }
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        let message = err.to_string();
        match err {
            DocumentError::DocumentNotFound(_) | DocumentError::ProjectNotFound(_) => {
                ApiError::NotFound(message)
            }
            DocumentError::TooLarge { .. }
            | DocumentError::UnsupportedContentType(_)
            | DocumentError::InvalidInput(_) => ApiError::Validation(message),
            DocumentError::AlreadyAttached(_)
            | DocumentError::AlreadyDecided { .. }
            | DocumentError::ProjectNotEditable { .. } => ApiError::Conflict(message),
            DocumentError::NotAMember | DocumentError::Forbidden(_) => {
                ApiError::Forbidden(message)
            }
            DocumentError::Storage(err) => storage_error(err),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        let message = err.to_string();
        match err {
            ReviewError::ProjectNotFound(_) => ApiError::NotFound(message),
            ReviewError::ProjectNotEditable { .. }
            | ReviewError::CannotSubmit { .. }
            | ReviewError::NoEnabledStages(_)
            | ReviewError::DocumentsNotVerified { .. }
            | ReviewError::ProjectNotInReview { .. }
            | ReviewError::NotAwaitingPermitPayment { .. } => ApiError::Conflict(message),
            ReviewError::NotAStageReviewer
            | ReviewError::NotAMember
            | ReviewError::Forbidden(_) => ApiError::Forbidden(message),
            ReviewError::ProcessingFeeUnpaid => ApiError::PaymentRequired(message),
            // Configuration drift is an operator problem, not a caller one
            ReviewError::StageMissing { .. } | ReviewError::StagePointerMissing(_) => {
                ApiError::Internal(message)
            }
            ReviewError::InvalidInput(_) => ApiError::Validation(message),
            ReviewError::PaymentGate(_) => ApiError::Internal(message),
            ReviewError::Storage(err) => storage_error(err),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let message = err.to_string();
        match err {
            BillingError::InvoiceNotFound(_)
            | BillingError::ProjectNotFound(_)
            | BillingError::UnknownReference(_) => ApiError::NotFound(message),
            BillingError::DuplicateInvoice { .. }
            | BillingError::NotPayable { .. }
            | BillingError::CannotConfirm { .. }
            | BillingError::AlreadySettled(_) => ApiError::Conflict(message),
            BillingError::NotAMember | BillingError::Forbidden(_) => ApiError::Forbidden(message),
            BillingError::InvalidInput(_) => ApiError::Validation(message),
            BillingError::Upstream(_) => ApiError::Upstream(message),
            BillingError::Storage(err) => storage_error(err),
        }
    }
}

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        let message = err.to_string();
        match err {
            NotifyError::InvalidInput(_) => ApiError::Validation(message),
            NotifyError::CooldownActive { .. } | NotifyError::TooManyAttempts => {
                ApiError::TooManyRequests(message)
            }
            NotifyError::Expired | NotifyError::InvalidCode => ApiError::BadRequest(message),
            NotifyError::Send(_) => ApiError::Upstream(message),
            NotifyError::Storage(err) => storage_error(err),
        }
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized("test".to_string())
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("test".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("test".to_string()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::PaymentRequired("test".to_string())
                .into_response()
                .status(),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn test_unpaid_processing_fee_maps_to_402() {
        let api: ApiError = ReviewError::ProcessingFeeUnpaid.into();
        assert_eq!(api.into_response().status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_unknown_callback_reference_maps_to_404() {
        let api: ApiError = BillingError::UnknownReference("MBMB-x".to_string()).into();
        assert_eq!(api.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_expired_session_maps_to_401() {
        let api: ApiError = AccountError::InvalidSession.into();
        assert_eq!(api.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_otp_cooldown_maps_to_429() {
        let api: ApiError = NotifyError::CooldownActive { retry_in_secs: 42 }.into();
        assert_eq!(api.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_decided_document_maps_to_409() {
        let api: ApiError = DocumentError::AlreadyDecided {
            status: "verified".to_string(),
        }
        .into();
        assert_eq!(api.into_response().status(), StatusCode::CONFLICT);
    }
}
