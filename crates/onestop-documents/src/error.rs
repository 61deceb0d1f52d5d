//! Document error types

use onestop_storage::StorageError;
use onestop_types::{DocumentId, ProjectId};
use thiserror::Error;

/// Document upload and verification errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("File too large: {size_bytes} bytes, limit is {max_bytes}")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("Content type not accepted: {0}")]
    UnsupportedContentType(String),

    #[error("Document already attached to project {0}")]
    AlreadyAttached(ProjectId),

    #[error("Document is {status}, expected pending")]
    AlreadyDecided { status: String },

    #[error("Project is {status} and no longer accepts documents")]
    ProjectNotEditable { status: String },

    #[error("Not a member of the project's business")]
    NotAMember,

    #[error("Operation not permitted: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for document operations
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;
