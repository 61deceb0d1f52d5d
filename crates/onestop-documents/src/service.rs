//! Document service: upload registration, attachment and officer decisions.

use crate::error::{DocumentError, DocumentResult};
use chrono::Utc;
use onestop_storage::{AuditAppend, PlatformStore, QueryWindow};
use onestop_types::{
    DocumentId, DocumentRecord, DocumentStatus, Notification, ProjectId, UserAccount, UserId,
};
use std::sync::Arc;

/// Upload acceptance policy
#[derive(Clone, Debug)]
pub struct DocumentPolicy {
    /// Largest accepted file in bytes
    pub max_size_bytes: u64,
    /// Accepted MIME content types
    pub allowed_content_types: Vec<String>,
}

impl Default for DocumentPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 16 * 1024 * 1024,
            allowed_content_types: vec![
                "application/pdf".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
            ],
        }
    }
}

impl DocumentPolicy {
    pub fn with_max_size_bytes(mut self, max: u64) -> Self {
        self.max_size_bytes = max;
        self
    }

    fn accepts(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(content_type))
    }
}

/// Metadata for a freshly uploaded file
#[derive(Clone, Debug)]
pub struct NewDocument {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Hex BLAKE3 checksum computed over the uploaded bytes
    pub checksum: String,
    /// Key of the bytes in the external object store
    pub storage_key: String,
}

/// Document service over a platform store
pub struct DocumentService<S: ?Sized> {
    store: Arc<S>,
    policy: DocumentPolicy,
}

impl<S: PlatformStore + ?Sized> DocumentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_policy(store, DocumentPolicy::default())
    }

    pub fn with_policy(store: Arc<S>, policy: DocumentPolicy) -> Self {
        Self { store, policy }
    }

    // ── Upload ───────────────────────────────────────────────────────

    /// Record an uploaded file. The record starts `Pending`.
    pub async fn register_upload(
        &self,
        owner: &UserAccount,
        upload: NewDocument,
    ) -> DocumentResult<DocumentRecord> {
        if upload.file_name.trim().is_empty() {
            return Err(DocumentError::InvalidInput(
                "file name must not be empty".to_string(),
            ));
        }
        if upload.size_bytes == 0 {
            return Err(DocumentError::InvalidInput(
                "file must not be empty".to_string(),
            ));
        }
        if upload.size_bytes > self.policy.max_size_bytes {
            return Err(DocumentError::TooLarge {
                size_bytes: upload.size_bytes,
                max_bytes: self.policy.max_size_bytes,
            });
        }
        if !self.policy.accepts(&upload.content_type) {
            return Err(DocumentError::UnsupportedContentType(upload.content_type));
        }

        let document = DocumentRecord::new(
            owner.id.clone(),
            upload.file_name,
            upload.content_type,
            upload.size_bytes,
            upload.checksum,
            upload.storage_key,
        );
        self.store.insert_document(document.clone()).await?;

        self.audit(
            &owner.id.0,
            "document_uploaded",
            &document.id.0,
            true,
            document.file_name.clone(),
            serde_json::json!({
                "content_type": document.content_type,
                "size_bytes": document.size_bytes,
            }),
        )
        .await?;

        tracing::info!(document_id = %document.id, owner = %owner.id, "document registered");
        Ok(document)
    }

    /// Attach a document to an application.
    ///
    /// The actor must be a member of the project's business, and must own
    /// the document unless their team role can manage the team. Attachment
    /// is refused once the project has been submitted.
    pub async fn attach_to_project(
        &self,
        actor: &UserAccount,
        document_id: &DocumentId,
        project_id: &ProjectId,
    ) -> DocumentResult<DocumentRecord> {
        let mut document = self.get_record(document_id).await?;
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| DocumentError::ProjectNotFound(project_id.clone()))?;

        let member = self
            .store
            .get_member(&project.business_id, &actor.id)
            .await?
            .ok_or(DocumentError::NotAMember)?;
        if document.owner != actor.id && !member.role.can_manage_team() {
            return Err(DocumentError::Forbidden(
                "only the uploader or a team manager may attach this document".to_string(),
            ));
        }
        if !project.can_submit() {
            return Err(DocumentError::ProjectNotEditable {
                status: project.status.as_str().to_string(),
            });
        }

        match &document.project_id {
            Some(existing) if existing == project_id => return Ok(document),
            Some(existing) => return Err(DocumentError::AlreadyAttached(existing.clone())),
            None => {}
        }

        document.project_id = Some(project_id.clone());
        self.store.update_document(document.clone()).await?;

        self.audit(
            &actor.id.0,
            "document_attached",
            &document.id.0,
            true,
            document.file_name.clone(),
            serde_json::json!({ "project_id": project_id.0 }),
        )
        .await?;

        Ok(document)
    }

    // ── Officer decisions ────────────────────────────────────────────

    /// Accept a pending document. Officer role required.
    pub async fn verify_document(
        &self,
        officer: &UserAccount,
        document_id: &DocumentId,
    ) -> DocumentResult<DocumentRecord> {
        self.require_staff(officer)?;
        let mut document = self.get_record(document_id).await?;
        self.require_pending(&document)?;

        document.verify(officer.id.clone());
        self.store.update_document(document.clone()).await?;

        self.notify_owner(
            &document,
            "Document verified",
            format!("{} has been verified", document.file_name),
        )
        .await?;
        self.audit(
            &officer.id.0,
            "document_verified",
            &document.id.0,
            true,
            document.file_name.clone(),
            serde_json::Value::Null,
        )
        .await?;

        tracing::info!(document_id = %document.id, officer = %officer.id, "document verified");
        Ok(document)
    }

    /// Refuse a pending document with a reason. Officer role required.
    pub async fn reject_document(
        &self,
        officer: &UserAccount,
        document_id: &DocumentId,
        reason: &str,
    ) -> DocumentResult<DocumentRecord> {
        self.require_staff(officer)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DocumentError::InvalidInput(
                "a rejection reason is required".to_string(),
            ));
        }

        let mut document = self.get_record(document_id).await?;
        self.require_pending(&document)?;

        document.reject(officer.id.clone(), reason);
        self.store.update_document(document.clone()).await?;

        self.notify_owner(
            &document,
            "Document rejected",
            format!("{} was rejected: {reason}", document.file_name),
        )
        .await?;
        self.audit(
            &officer.id.0,
            "document_rejected",
            &document.id.0,
            true,
            reason.to_string(),
            serde_json::Value::Null,
        )
        .await?;

        tracing::info!(document_id = %document.id, officer = %officer.id, "document rejected");
        Ok(document)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Fetch a document. Owner or staff only.
    pub async fn get_document(
        &self,
        actor: &UserAccount,
        document_id: &DocumentId,
    ) -> DocumentResult<DocumentRecord> {
        let document = self.get_record(document_id).await?;
        if document.owner != actor.id && !actor.role.is_staff() {
            return Err(DocumentError::Forbidden(
                "not the document owner".to_string(),
            ));
        }
        Ok(document)
    }

    /// Documents attached to a project, oldest first.
    pub async fn documents_for_project(
        &self,
        actor: &UserAccount,
        project_id: &ProjectId,
    ) -> DocumentResult<Vec<DocumentRecord>> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| DocumentError::ProjectNotFound(project_id.clone()))?;
        if !actor.role.is_staff() {
            self.store
                .get_member(&project.business_id, &actor.id)
                .await?
                .ok_or(DocumentError::NotAMember)?;
        }
        Ok(self.store.list_documents_for_project(project_id).await?)
    }

    /// The caller's own uploads, newest first.
    pub async fn documents_for_owner(
        &self,
        owner: &UserId,
        window: QueryWindow,
    ) -> DocumentResult<Vec<DocumentRecord>> {
        Ok(self.store.list_documents_for_owner(owner, window).await?)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn get_record(&self, id: &DocumentId) -> DocumentResult<DocumentRecord> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| DocumentError::DocumentNotFound(id.clone()))
    }

    fn require_staff(&self, actor: &UserAccount) -> DocumentResult<()> {
        if actor.role.is_staff() {
            Ok(())
        } else {
            Err(DocumentError::Forbidden(
                "requires an officer role".to_string(),
            ))
        }
    }

    fn require_pending(&self, document: &DocumentRecord) -> DocumentResult<()> {
        if document.status == DocumentStatus::Pending {
            Ok(())
        } else {
            Err(DocumentError::AlreadyDecided {
                status: document.status.as_str().to_string(),
            })
        }
    }

    async fn notify_owner(
        &self,
        document: &DocumentRecord,
        title: &str,
        body: String,
    ) -> DocumentResult<()> {
        let notification = Notification::new(document.owner.clone(), title, body)
            .with_data(serde_json::json!({ "document_id": document.id.0 }));
        self.store.enqueue_notification(notification).await?;
        Ok(())
    }

    async fn audit(
        &self,
        actor: &str,
        action: &str,
        subject: &str,
        success: bool,
        message: String,
        payload: serde_json::Value,
    ) -> DocumentResult<()> {
        self.store
            .append_audit(AuditAppend {
                timestamp: Utc::now(),
                actor: actor.to_string(),
                action: action.to_string(),
                subject: subject.to_string(),
                success,
                message,
                payload,
            })
            .await?;
        Ok(())
    }
}
