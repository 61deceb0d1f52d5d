//! In-memory reference implementation for the OneStop storage traits.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! should use the PostgreSQL adapter for source-of-truth data.

use crate::model::{compute_audit_hash, AuditAppend, AuditEvent};
use crate::traits::{
    AccountStore, AuditStore, BillingStore, DocumentStore, NotifyStore, ProjectStore, QueryWindow,
    ReviewStore,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use onestop_types::{
    Business, BusinessId, BusinessMember, Credential, DeviceToken, DocumentId, DocumentRecord,
    InvitationId, Invoice, InvoiceId, Notification, NotificationId, OtpChallenge, Project,
    ProjectId, ReviewRecord, ReviewStage, Session, StageName, TeamInvitation, UserAccount, UserId,
};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory OneStop storage adapter.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, UserAccount>>,
    credentials: RwLock<HashMap<UserId, Credential>>,
    sessions: RwLock<HashMap<String, Session>>,
    businesses: RwLock<HashMap<BusinessId, Business>>,
    members: RwLock<Vec<BusinessMember>>,
    invitations: RwLock<HashMap<InvitationId, TeamInvitation>>,
    documents: RwLock<HashMap<DocumentId, DocumentRecord>>,
    projects: RwLock<HashMap<ProjectId, Project>>,
    stages: RwLock<HashMap<(String, String), ReviewStage>>,
    reviews: RwLock<Vec<ReviewRecord>>,
    invoices: RwLock<HashMap<InvoiceId, Invoice>>,
    device_tokens: RwLock<HashMap<(UserId, String), DeviceToken>>,
    notifications: RwLock<HashMap<NotificationId, Notification>>,
    otp_challenges: RwLock<HashMap<String, OtpChallenge>>,
    audits: RwLock<Vec<AuditEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn create_user(&self, user: UserAccount) -> StorageResult<()> {
        let mut guard = self
            .users
            .write()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;

        if guard.contains_key(&user.id) {
            return Err(StorageError::Conflict(format!(
                "user {} already exists",
                user.id
            )));
        }
        if guard.values().any(|u| u.email == user.email) {
            return Err(StorageError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        if guard.values().any(|u| u.phone == user.phone) {
            return Err(StorageError::Conflict(format!(
                "phone {} already registered",
                user.phone
            )));
        }

        guard.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<UserAccount>> {
        let guard = self
            .users
            .read()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<UserAccount>> {
        let guard = self
            .users
            .read()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;
        Ok(guard.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_phone(&self, phone: &str) -> StorageResult<Option<UserAccount>> {
        let guard = self
            .users
            .read()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;
        Ok(guard.values().find(|u| u.phone == phone).cloned())
    }

    async fn update_user(&self, user: UserAccount) -> StorageResult<()> {
        let mut guard = self
            .users
            .write()
            .map_err(|_| StorageError::Backend("users lock poisoned".to_string()))?;
        if !guard.contains_key(&user.id) {
            return Err(StorageError::NotFound(format!("user {} not found", user.id)));
        }
        guard.insert(user.id.clone(), user);
        Ok(())
    }

    async fn upsert_credential(&self, credential: Credential) -> StorageResult<()> {
        let mut guard = self
            .credentials
            .write()
            .map_err(|_| StorageError::Backend("credentials lock poisoned".to_string()))?;
        guard.insert(credential.user_id.clone(), credential);
        Ok(())
    }

    async fn get_credential(&self, user_id: &UserId) -> StorageResult<Option<Credential>> {
        let guard = self
            .credentials
            .read()
            .map_err(|_| StorageError::Backend("credentials lock poisoned".to_string()))?;
        Ok(guard.get(user_id).cloned())
    }

    async fn create_session(&self, session: Session) -> StorageResult<()> {
        let mut guard = self
            .sessions
            .write()
            .map_err(|_| StorageError::Backend("sessions lock poisoned".to_string()))?;
        if guard.contains_key(&session.token) {
            return Err(StorageError::Conflict("session token collision".to_string()));
        }
        guard.insert(session.token.clone(), session);
        Ok(())
    }

    async fn get_session(&self, token: &str) -> StorageResult<Option<Session>> {
        let guard = self
            .sessions
            .read()
            .map_err(|_| StorageError::Backend("sessions lock poisoned".to_string()))?;
        Ok(guard.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> StorageResult<()> {
        let mut guard = self
            .sessions
            .write()
            .map_err(|_| StorageError::Backend("sessions lock poisoned".to_string()))?;
        guard.remove(token);
        Ok(())
    }

    async fn create_business(&self, business: Business) -> StorageResult<()> {
        let mut guard = self
            .businesses
            .write()
            .map_err(|_| StorageError::Backend("businesses lock poisoned".to_string()))?;
        if guard.contains_key(&business.id) {
            return Err(StorageError::Conflict(format!(
                "business {} already exists",
                business.id
            )));
        }
        if guard.values().any(|b| b.ssm_number == business.ssm_number) {
            return Err(StorageError::Conflict(format!(
                "registration number {} already registered",
                business.ssm_number
            )));
        }
        guard.insert(business.id.clone(), business);
        Ok(())
    }

    async fn get_business(&self, id: &BusinessId) -> StorageResult<Option<Business>> {
        let guard = self
            .businesses
            .read()
            .map_err(|_| StorageError::Backend("businesses lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn get_business_by_ssm(&self, ssm_number: &str) -> StorageResult<Option<Business>> {
        let guard = self
            .businesses
            .read()
            .map_err(|_| StorageError::Backend("businesses lock poisoned".to_string()))?;
        Ok(guard.values().find(|b| b.ssm_number == ssm_number).cloned())
    }

    async fn list_businesses_for_user(&self, user: &UserId) -> StorageResult<Vec<Business>> {
        let member_of = {
            let guard = self
                .members
                .read()
                .map_err(|_| StorageError::Backend("members lock poisoned".to_string()))?;
            guard
                .iter()
                .filter(|m| &m.user_id == user)
                .map(|m| m.business_id.clone())
                .collect::<Vec<_>>()
        };

        let guard = self
            .businesses
            .read()
            .map_err(|_| StorageError::Backend("businesses lock poisoned".to_string()))?;
        let mut values = member_of
            .iter()
            .filter_map(|id| guard.get(id).cloned())
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(values)
    }

    async fn add_member(&self, member: BusinessMember) -> StorageResult<()> {
        let mut guard = self
            .members
            .write()
            .map_err(|_| StorageError::Backend("members lock poisoned".to_string()))?;
        if guard
            .iter()
            .any(|m| m.business_id == member.business_id && m.user_id == member.user_id)
        {
            return Err(StorageError::Conflict(format!(
                "user {} is already a member of business {}",
                member.user_id, member.business_id
            )));
        }
        guard.push(member);
        Ok(())
    }

    async fn get_member(
        &self,
        business: &BusinessId,
        user: &UserId,
    ) -> StorageResult<Option<BusinessMember>> {
        let guard = self
            .members
            .read()
            .map_err(|_| StorageError::Backend("members lock poisoned".to_string()))?;
        Ok(guard
            .iter()
            .find(|m| &m.business_id == business && &m.user_id == user)
            .cloned())
    }

    async fn list_members(&self, business: &BusinessId) -> StorageResult<Vec<BusinessMember>> {
        let guard = self
            .members
            .read()
            .map_err(|_| StorageError::Backend("members lock poisoned".to_string()))?;
        let mut values = guard
            .iter()
            .filter(|m| &m.business_id == business)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(values)
    }

    async fn create_invitation(&self, invitation: TeamInvitation) -> StorageResult<()> {
        let mut guard = self
            .invitations
            .write()
            .map_err(|_| StorageError::Backend("invitations lock poisoned".to_string()))?;
        if guard.contains_key(&invitation.id) {
            return Err(StorageError::Conflict(format!(
                "invitation {} already exists",
                invitation.id
            )));
        }
        if guard.values().any(|i| i.token == invitation.token) {
            return Err(StorageError::Conflict("invitation token collision".to_string()));
        }
        guard.insert(invitation.id.clone(), invitation);
        Ok(())
    }

    async fn get_invitation(&self, id: &InvitationId) -> StorageResult<Option<TeamInvitation>> {
        let guard = self
            .invitations
            .read()
            .map_err(|_| StorageError::Backend("invitations lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn get_invitation_by_token(
        &self,
        token: &str,
    ) -> StorageResult<Option<TeamInvitation>> {
        let guard = self
            .invitations
            .read()
            .map_err(|_| StorageError::Backend("invitations lock poisoned".to_string()))?;
        Ok(guard.values().find(|i| i.token == token).cloned())
    }

    async fn update_invitation(&self, invitation: TeamInvitation) -> StorageResult<()> {
        let mut guard = self
            .invitations
            .write()
            .map_err(|_| StorageError::Backend("invitations lock poisoned".to_string()))?;
        if !guard.contains_key(&invitation.id) {
            return Err(StorageError::NotFound(format!(
                "invitation {} not found",
                invitation.id
            )));
        }
        guard.insert(invitation.id.clone(), invitation);
        Ok(())
    }

    async fn list_invitations(
        &self,
        business: &BusinessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<TeamInvitation>> {
        let guard = self
            .invitations
            .read()
            .map_err(|_| StorageError::Backend("invitations lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|i| &i.business_id == business)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_document(&self, document: DocumentRecord) -> StorageResult<()> {
        let mut guard = self
            .documents
            .write()
            .map_err(|_| StorageError::Backend("documents lock poisoned".to_string()))?;
        if guard.contains_key(&document.id) {
            return Err(StorageError::Conflict(format!(
                "document {} already exists",
                document.id
            )));
        }
        guard.insert(document.id.clone(), document);
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> StorageResult<Option<DocumentRecord>> {
        let guard = self
            .documents
            .read()
            .map_err(|_| StorageError::Backend("documents lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn update_document(&self, document: DocumentRecord) -> StorageResult<()> {
        let mut guard = self
            .documents
            .write()
            .map_err(|_| StorageError::Backend("documents lock poisoned".to_string()))?;
        if !guard.contains_key(&document.id) {
            return Err(StorageError::NotFound(format!(
                "document {} not found",
                document.id
            )));
        }
        guard.insert(document.id.clone(), document);
        Ok(())
    }

    async fn list_documents_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<DocumentRecord>> {
        let guard = self
            .documents
            .read()
            .map_err(|_| StorageError::Backend("documents lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|d| d.project_id.as_ref() == Some(project))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(values)
    }

    async fn list_documents_for_owner(
        &self,
        owner: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<DocumentRecord>> {
        let guard = self
            .documents
            .read()
            .map_err(|_| StorageError::Backend("documents lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|d| &d.owner == owner)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn insert_project(&self, project: Project) -> StorageResult<()> {
        let mut guard = self
            .projects
            .write()
            .map_err(|_| StorageError::Backend("projects lock poisoned".to_string()))?;
        if guard.contains_key(&project.id) {
            return Err(StorageError::Conflict(format!(
                "project {} already exists",
                project.id
            )));
        }
        guard.insert(project.id.clone(), project);
        Ok(())
    }

    async fn get_project(&self, id: &ProjectId) -> StorageResult<Option<Project>> {
        let guard = self
            .projects
            .read()
            .map_err(|_| StorageError::Backend("projects lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn update_project(&self, project: Project) -> StorageResult<()> {
        let mut guard = self
            .projects
            .write()
            .map_err(|_| StorageError::Backend("projects lock poisoned".to_string()))?;
        if !guard.contains_key(&project.id) {
            return Err(StorageError::NotFound(format!(
                "project {} not found",
                project.id
            )));
        }
        guard.insert(project.id.clone(), project);
        Ok(())
    }

    async fn list_projects_for_applicant(
        &self,
        applicant: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>> {
        let guard = self
            .projects
            .read()
            .map_err(|_| StorageError::Backend("projects lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|p| &p.applicant == applicant)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_window(values, window))
    }

    async fn list_projects_for_business(
        &self,
        business: &BusinessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>> {
        let guard = self
            .projects
            .read()
            .map_err(|_| StorageError::Backend("projects lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|p| &p.business_id == business)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_window(values, window))
    }

    async fn list_projects_in_review(
        &self,
        module: &str,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>> {
        let guard = self
            .projects
            .read()
            .map_err(|_| StorageError::Backend("projects lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|p| p.module == module && p.is_in_review())
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn upsert_stage(&self, stage: ReviewStage) -> StorageResult<()> {
        let mut guard = self
            .stages
            .write()
            .map_err(|_| StorageError::Backend("stages lock poisoned".to_string()))?;
        guard.insert((stage.module.clone(), stage.name.0.clone()), stage);
        Ok(())
    }

    async fn get_stage(
        &self,
        module: &str,
        name: &StageName,
    ) -> StorageResult<Option<ReviewStage>> {
        let guard = self
            .stages
            .read()
            .map_err(|_| StorageError::Backend("stages lock poisoned".to_string()))?;
        Ok(guard.get(&(module.to_string(), name.0.clone())).cloned())
    }

    async fn list_stages(&self, module: &str) -> StorageResult<Vec<ReviewStage>> {
        let guard = self
            .stages
            .read()
            .map_err(|_| StorageError::Backend("stages lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|s| s.module == module)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|s| s.ordinal);
        Ok(values)
    }

    async fn append_review(&self, record: ReviewRecord) -> StorageResult<()> {
        let mut guard = self
            .reviews
            .write()
            .map_err(|_| StorageError::Backend("reviews lock poisoned".to_string()))?;
        guard.push(record);
        Ok(())
    }

    async fn list_reviews_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<ReviewRecord>> {
        let guard = self
            .reviews
            .read()
            .map_err(|_| StorageError::Backend("reviews lock poisoned".to_string()))?;
        let mut values = guard
            .iter()
            .filter(|r| &r.project_id == project)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.decided_at.cmp(&b.decided_at));
        Ok(values)
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn insert_invoice(&self, invoice: Invoice) -> StorageResult<()> {
        let mut guard = self
            .invoices
            .write()
            .map_err(|_| StorageError::Backend("invoices lock poisoned".to_string()))?;
        if guard.contains_key(&invoice.id) {
            return Err(StorageError::Conflict(format!(
                "invoice {} already exists",
                invoice.id
            )));
        }
        guard.insert(invoice.id.clone(), invoice);
        Ok(())
    }

    async fn get_invoice(&self, id: &InvoiceId) -> StorageResult<Option<Invoice>> {
        let guard = self
            .invoices
            .read()
            .map_err(|_| StorageError::Backend("invoices lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn update_invoice(&self, invoice: Invoice) -> StorageResult<()> {
        let mut guard = self
            .invoices
            .write()
            .map_err(|_| StorageError::Backend("invoices lock poisoned".to_string()))?;
        if !guard.contains_key(&invoice.id) {
            return Err(StorageError::NotFound(format!(
                "invoice {} not found",
                invoice.id
            )));
        }
        guard.insert(invoice.id.clone(), invoice);
        Ok(())
    }

    async fn find_invoice_by_reference(
        &self,
        reference: &str,
    ) -> StorageResult<Option<Invoice>> {
        let guard = self
            .invoices
            .read()
            .map_err(|_| StorageError::Backend("invoices lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .find(|i| i.mbmb_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn list_invoices_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<Invoice>> {
        let guard = self
            .invoices
            .read()
            .map_err(|_| StorageError::Backend("invoices lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|i| &i.project_id == project)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(values)
    }
}

#[async_trait]
impl NotifyStore for InMemoryStore {
    async fn upsert_device_token(&self, token: DeviceToken) -> StorageResult<()> {
        let mut guard = self
            .device_tokens
            .write()
            .map_err(|_| StorageError::Backend("device tokens lock poisoned".to_string()))?;
        guard.insert((token.user_id.clone(), token.token.clone()), token);
        Ok(())
    }

    async fn list_device_tokens(&self, user: &UserId) -> StorageResult<Vec<DeviceToken>> {
        let guard = self
            .device_tokens
            .read()
            .map_err(|_| StorageError::Backend("device tokens lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|t| &t.user_id == user)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        Ok(values)
    }

    async fn enqueue_notification(&self, notification: Notification) -> StorageResult<()> {
        let mut guard = self
            .notifications
            .write()
            .map_err(|_| StorageError::Backend("notifications lock poisoned".to_string()))?;
        if guard.contains_key(&notification.id) {
            return Err(StorageError::Conflict(format!(
                "notification {} already exists",
                notification.id
            )));
        }
        guard.insert(notification.id.clone(), notification);
        Ok(())
    }

    async fn list_notifications_for_user(
        &self,
        user: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>> {
        let guard = self
            .notifications
            .read()
            .map_err(|_| StorageError::Backend("notifications lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|n| &n.user_id == user)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_window(values, window))
    }

    async fn list_queued_notifications(
        &self,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>> {
        let guard = self
            .notifications
            .read()
            .map_err(|_| StorageError::Backend("notifications lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|n| n.status == onestop_types::NotificationStatus::Queued)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(apply_window(values, window))
    }

    async fn update_notification(&self, notification: Notification) -> StorageResult<()> {
        let mut guard = self
            .notifications
            .write()
            .map_err(|_| StorageError::Backend("notifications lock poisoned".to_string()))?;
        if !guard.contains_key(&notification.id) {
            return Err(StorageError::NotFound(format!(
                "notification {} not found",
                notification.id
            )));
        }
        guard.insert(notification.id.clone(), notification);
        Ok(())
    }

    async fn upsert_otp_challenge(&self, challenge: OtpChallenge) -> StorageResult<()> {
        let mut guard = self
            .otp_challenges
            .write()
            .map_err(|_| StorageError::Backend("otp lock poisoned".to_string()))?;
        guard.insert(challenge.phone.clone(), challenge);
        Ok(())
    }

    async fn get_otp_challenge(&self, phone: &str) -> StorageResult<Option<OtpChallenge>> {
        let guard = self
            .otp_challenges
            .read()
            .map_err(|_| StorageError::Backend("otp lock poisoned".to_string()))?;
        Ok(guard.get(phone).cloned())
    }

    async fn delete_otp_challenge(&self, phone: &str) -> StorageResult<()> {
        let mut guard = self
            .otp_challenges
            .write()
            .map_err(|_| StorageError::Backend("otp lock poisoned".to_string()))?;
        guard.remove(phone);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditEvent> {
        let mut guard = self
            .audits
            .write()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;

        let previous_hash = guard.last().map(|e| e.hash.clone());
        let sequence = guard.len() as u64 + 1;
        let hash = compute_audit_hash(&event, previous_hash.as_deref(), sequence)?;

        let record = AuditEvent {
            event_id: format!("audit-{}", Uuid::new_v4()),
            sequence,
            timestamp: event.timestamp,
            actor: event.actor,
            action: event.action,
            subject: event.subject,
            success: event.success,
            message: event.message,
            payload: event.payload,
            previous_hash,
            hash,
        };

        guard.push(record.clone());
        Ok(record)
    }

    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditEvent>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        let mut values = guard.clone();
        values.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(apply_window(values, window))
    }

    async fn latest_audit_hash(&self) -> StorageResult<Option<String>> {
        let guard = self
            .audits
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        Ok(guard.last().map(|e| e.hash.clone()))
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use onestop_types::{
        BusinessRole, DevicePlatform, InvoiceKind, ProjectStatus, ReviewDecision,
    };

    fn sample_user(email: &str, phone: &str) -> UserAccount {
        UserAccount::new("Sample User", email, phone, "880101045678")
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = InMemoryStore::new();
        store
            .create_user(sample_user("a@example.com", "+60120000001"))
            .await
            .unwrap();

        let result = store
            .create_user(sample_user("a@example.com", "+60120000002"))
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn duplicate_phone_is_a_conflict() {
        let store = InMemoryStore::new();
        store
            .create_user(sample_user("a@example.com", "+60120000001"))
            .await
            .unwrap();

        let result = store
            .create_user(sample_user("b@example.com", "+60120000001"))
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn membership_backs_business_listing() {
        let store = InMemoryStore::new();
        let owner = sample_user("owner@example.com", "+60120000001");
        let owner_id = owner.id.clone();
        store.create_user(owner).await.unwrap();

        let business = Business::new("Kedai Kopi Melaka", "202301012345", owner_id.clone());
        let business_id = business.id.clone();
        store.create_business(business).await.unwrap();
        store
            .add_member(BusinessMember::new(
                business_id.clone(),
                owner_id.clone(),
                BusinessRole::Owner,
            ))
            .await
            .unwrap();

        let businesses = store.list_businesses_for_user(&owner_id).await.unwrap();
        assert_eq!(businesses.len(), 1);
        assert_eq!(businesses[0].id, business_id);

        let duplicate = store
            .add_member(BusinessMember::new(
                business_id,
                owner_id,
                BusinessRole::Manager,
            ))
            .await;
        assert!(matches!(duplicate, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn stages_list_in_ordinal_order() {
        let store = InMemoryStore::new();
        store
            .upsert_stage(ReviewStage::new("myskb", StageName::new("final"), 3))
            .await
            .unwrap();
        store
            .upsert_stage(ReviewStage::new("myskb", StageName::new("level1"), 1))
            .await
            .unwrap();
        store
            .upsert_stage(ReviewStage::new("myskb", StageName::new("level2"), 2))
            .await
            .unwrap();
        store
            .upsert_stage(ReviewStage::new("other", StageName::new("level1"), 1))
            .await
            .unwrap();

        let stages = store.list_stages("myskb").await.unwrap();
        let names = stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["level1", "level2", "final"]);
    }

    #[tokio::test]
    async fn review_history_reads_oldest_first() {
        let store = InMemoryStore::new();
        let project_id = ProjectId::new("proj-1");

        let mut first = ReviewRecord::new(
            project_id.clone(),
            StageName::new("level1"),
            ReviewDecision::Approved,
            "one@mbmb.gov.my",
            None,
        );
        first.decided_at = Utc::now() - Duration::seconds(10);
        let second = ReviewRecord::new(
            project_id.clone(),
            StageName::new("level2"),
            ReviewDecision::Rejected,
            "two@mbmb.gov.my",
            Some("incomplete".to_string()),
        );

        store.append_review(second).await.unwrap();
        store.append_review(first).await.unwrap();

        let history = store.list_reviews_for_project(&project_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].stage, StageName::new("level1"));
        assert_eq!(history[1].stage, StageName::new("level2"));
    }

    #[tokio::test]
    async fn invoice_reference_lookup() {
        let store = InMemoryStore::new();
        let mut invoice = Invoice::new(ProjectId::new("proj-1"), InvoiceKind::ProcessingFee, 15_000);
        invoice.mark_payment_pending("MBMB-REF-42");
        let id = invoice.id.clone();
        store.insert_invoice(invoice).await.unwrap();

        let found = store
            .find_invoice_by_reference("MBMB-REF-42")
            .await
            .unwrap()
            .expect("invoice by reference");
        assert_eq!(found.id, id);

        assert!(store
            .find_invoice_by_reference("MBMB-REF-43")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn queued_notifications_drain_oldest_first() {
        let store = InMemoryStore::new();
        let user = UserId::new("user-1");

        let mut older = Notification::new(user.clone(), "first", "body");
        older.created_at = Utc::now() - Duration::seconds(30);
        let newer = Notification::new(user.clone(), "second", "body");
        let mut sent = Notification::new(user.clone(), "third", "body");
        sent.mark_sent();

        store.enqueue_notification(newer).await.unwrap();
        store.enqueue_notification(older).await.unwrap();
        store.enqueue_notification(sent).await.unwrap();

        let queued = store
            .list_queued_notifications(QueryWindow::default())
            .await
            .unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].title, "first");
        assert_eq!(queued[1].title, "second");
    }

    #[tokio::test]
    async fn in_review_listing_filters_by_module_and_status() {
        let store = InMemoryStore::new();
        let mut submitted = Project::new(
            "myskb",
            UserId::new("user-1"),
            BusinessId::new("biz-1"),
            "Billboard",
            "Jalan Hang Tuah",
        );
        submitted.begin_review(StageName::new("level1"));
        let draft = Project::new(
            "myskb",
            UserId::new("user-1"),
            BusinessId::new("biz-1"),
            "Renovation",
            "Jalan Bunga Raya",
        );

        store.insert_project(submitted.clone()).await.unwrap();
        store.insert_project(draft).await.unwrap();

        let in_review = store
            .list_projects_in_review("myskb", QueryWindow::default())
            .await
            .unwrap();
        assert_eq!(in_review.len(), 1);
        assert_eq!(in_review[0].id, submitted.id);
        assert_eq!(in_review[0].status, ProjectStatus::InReview);
    }

    #[tokio::test]
    async fn audit_chain_hashes_are_linked() {
        let store = InMemoryStore::new();
        let first = store
            .append_audit(AuditAppend {
                timestamp: Utc::now(),
                actor: "user-1".to_string(),
                action: "project_submitted".to_string(),
                subject: "proj-1".to_string(),
                success: true,
                message: "submitted for review".to_string(),
                payload: serde_json::json!({"stage": "level1"}),
            })
            .await
            .unwrap();
        let second = store
            .append_audit(AuditAppend {
                timestamp: Utc::now() + Duration::seconds(1),
                actor: "officer@mbmb.gov.my".to_string(),
                action: "stage_approved".to_string(),
                subject: "proj-1".to_string(),
                success: true,
                message: "level1 approved".to_string(),
                payload: serde_json::json!({"next": "level2"}),
            })
            .await
            .unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.previous_hash, Some(first.hash));
    }

    #[tokio::test]
    async fn otp_challenge_round_trip() {
        let store = InMemoryStore::new();
        let challenge = OtpChallenge::new("+60123456789", "ab".repeat(32), 300);
        store.upsert_otp_challenge(challenge).await.unwrap();

        assert!(store
            .get_otp_challenge("+60123456789")
            .await
            .unwrap()
            .is_some());

        store.delete_otp_challenge("+60123456789").await.unwrap();
        assert!(store
            .get_otp_challenge("+60123456789")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn device_tokens_upsert_by_user_and_token() {
        let store = InMemoryStore::new();
        let user = UserId::new("user-1");
        store
            .upsert_device_token(DeviceToken::new(user.clone(), "tok-a", DevicePlatform::Android))
            .await
            .unwrap();
        store
            .upsert_device_token(DeviceToken::new(user.clone(), "tok-a", DevicePlatform::Android))
            .await
            .unwrap();
        store
            .upsert_device_token(DeviceToken::new(user.clone(), "tok-b", DevicePlatform::Ios))
            .await
            .unwrap();

        let tokens = store.list_device_tokens(&user).await.unwrap();
        assert_eq!(tokens.len(), 2);
    }
}
