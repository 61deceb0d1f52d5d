//! Documents: upload metadata and the officer verification lifecycle.
//!
//! File bytes live in an external object store; the platform records
//! metadata plus a BLAKE3 checksum and carries each document through
//! pending, verified, and rejected states.

use crate::account::UserId;
use crate::project::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Document Identifier ──────────────────────────────────────────────

/// Unique identifier for an uploaded document
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Document Status ──────────────────────────────────────────────────

/// Verification state of a document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum DocumentStatus {
    /// Uploaded, awaiting an officer decision
    #[default]
    Pending,
    /// Accepted by an officer
    Verified,
    /// Refused by an officer with a stated reason
    Rejected { reason: String },
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected { .. } => "rejected",
        }
    }

    /// Check if an officer has already decided this document
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// ── Document Record ──────────────────────────────────────────────────

/// Metadata for one uploaded document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique document identifier
    pub id: DocumentId,
    /// The account that uploaded the file
    pub owner: UserId,
    /// The application the document supports, once attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// Original file name as uploaded
    pub file_name: String,
    /// MIME content type
    pub content_type: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Hex-encoded BLAKE3 checksum of the uploaded bytes
    pub checksum: String,
    /// Key of the bytes in the external object store
    pub storage_key: String,
    /// Verification state
    pub status: DocumentStatus,
    /// The officer that decided the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<UserId>,
    /// When the officer decided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    /// When the file was uploaded
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(
        owner: UserId,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        size_bytes: u64,
        checksum: impl Into<String>,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::generate(),
            owner,
            project_id: None,
            file_name: file_name.into(),
            content_type: content_type.into(),
            size_bytes,
            checksum: checksum.into(),
            storage_key: storage_key.into(),
            status: DocumentStatus::Pending,
            verified_by: None,
            decided_at: None,
            uploaded_at: Utc::now(),
        }
    }

    /// Accept the document
    pub fn verify(&mut self, officer: UserId) {
        self.status = DocumentStatus::Verified;
        self.verified_by = Some(officer);
        self.decided_at = Some(Utc::now());
    }

    /// Refuse the document with a reason
    pub fn reject(&mut self, officer: UserId, reason: impl Into<String>) {
        self.status = DocumentStatus::Rejected {
            reason: reason.into(),
        };
        self.verified_by = Some(officer);
        self.decided_at = Some(Utc::now());
    }

    pub fn is_verified(&self) -> bool {
        self.status == DocumentStatus::Verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_document() -> DocumentRecord {
        DocumentRecord::new(
            UserId::new("user-1"),
            "site-plan.pdf",
            "application/pdf",
            120_000,
            "ab".repeat(32),
            "uploads/user-1/site-plan.pdf",
        )
    }

    #[test]
    fn test_new_document_is_pending() {
        let doc = make_document();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(!doc.status.is_decided());
        assert!(doc.verified_by.is_none());
    }

    #[test]
    fn test_verify_stamps_officer_and_time() {
        let mut doc = make_document();
        doc.verify(UserId::new("officer-1"));
        assert!(doc.is_verified());
        assert_eq!(doc.verified_by, Some(UserId::new("officer-1")));
        assert!(doc.decided_at.is_some());
    }

    #[test]
    fn test_reject_carries_reason() {
        let mut doc = make_document();
        doc.reject(UserId::new("officer-1"), "blurry scan");
        assert!(doc.status.is_decided());
        assert!(!doc.is_verified());
        match &doc.status {
            DocumentStatus::Rejected { reason } => assert_eq!(reason, "blurry scan"),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(DocumentStatus::Pending.as_str(), "pending");
        assert_eq!(DocumentStatus::Verified.as_str(), "verified");
        assert_eq!(
            DocumentStatus::Rejected {
                reason: "x".to_string()
            }
            .as_str(),
            "rejected"
        );
    }
}
