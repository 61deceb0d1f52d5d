//! Review error types

use crate::gate::GateError;
use onestop_storage::StorageError;
use onestop_types::ProjectId;
use thiserror::Error;

/// Project and review-machine errors
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Project is {status} and cannot be edited")]
    ProjectNotEditable { status: String },

    #[error("Project is {status} and cannot be submitted")]
    CannotSubmit { status: String },

    #[error("Module {0} has no enabled review stages")]
    NoEnabledStages(String),

    #[error("{pending} attached document(s) are not verified")]
    DocumentsNotVerified { pending: usize },

    #[error("Project is {status}, expected in_review")]
    ProjectNotInReview { status: String },

    #[error("Reviewer is not assigned to the current stage")]
    NotAStageReviewer,

    #[error("Stage {name} is not configured for module {module}")]
    StageMissing { module: String, name: String },

    #[error("Project {0} is in review without a stage pointer")]
    StagePointerMissing(ProjectId),

    #[error("Processing fee has not been paid")]
    ProcessingFeeUnpaid,

    #[error("Project is {status}, expected pending_permit_payment")]
    NotAwaitingPermitPayment { status: String },

    #[error("Not a member of the project's business")]
    NotAMember,

    #[error("Operation not permitted: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    PaymentGate(#[from] GateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for review operations
pub type ReviewResult<T> = std::result::Result<T, ReviewError>;
