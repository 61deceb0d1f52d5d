//! Billing error types

use onestop_mbmb::MbmbError;
use onestop_storage::StorageError;
use onestop_types::{InvoiceId, ProjectId};
use thiserror::Error;

/// Errors surfaced by billing operations
#[derive(Debug, Error)]
pub enum BillingError {
    /// No invoice with the given identifier
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// No project with the given identifier
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// A live invoice of this kind already exists for the project
    #[error("A live {kind} invoice already exists for this project")]
    DuplicateInvoice { kind: String },

    /// Payment can only be initiated for unpaid invoices
    #[error("Invoice cannot be paid in status `{status}`")]
    NotPayable { status: String },

    /// A cancelled invoice can never be confirmed
    #[error("Invoice cannot be confirmed in status `{status}`")]
    CannotConfirm { status: String },

    /// A paid invoice cannot be withdrawn
    #[error("Invoice {0} is already paid")]
    AlreadySettled(InvoiceId),

    /// Payment confirmation for a reference no invoice carries
    #[error("No invoice holds payment reference `{0}`")]
    UnknownReference(String),

    /// The caller does not belong to the project's business
    #[error("Not a member of this business")]
    NotAMember,

    /// The caller's role does not allow the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The council API refused or failed the call
    #[error("MBMB upstream error: {0}")]
    Upstream(#[from] MbmbError),

    /// Storage layer failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for billing operations
pub type BillingResult<T> = Result<T, BillingError>;
