use crate::model::{AuditAppend, AuditEvent};
use crate::StorageResult;
use async_trait::async_trait;
use onestop_types::{
    Business, BusinessId, BusinessMember, Credential, DeviceToken, DocumentId, DocumentRecord,
    InvitationId, Invoice, InvoiceId, Notification, NotificationId, OtpChallenge, Project,
    ProjectId, ReviewRecord, ReviewStage, Session, StageName, TeamInvitation, UserAccount, UserId,
};

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Storage interface for user accounts, businesses, and team membership.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; duplicate email or phone is a conflict.
    async fn create_user(&self, user: UserAccount) -> StorageResult<()>;

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<UserAccount>>;

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<UserAccount>>;

    async fn get_user_by_phone(&self, phone: &str) -> StorageResult<Option<UserAccount>>;

    /// Replace a stored account record.
    async fn update_user(&self, user: UserAccount) -> StorageResult<()>;

    /// Insert or replace the password digest for an account.
    async fn upsert_credential(&self, credential: Credential) -> StorageResult<()>;

    async fn get_credential(&self, user_id: &UserId) -> StorageResult<Option<Credential>>;

    /// Insert a session keyed by its bearer token.
    async fn create_session(&self, session: Session) -> StorageResult<()>;

    async fn get_session(&self, token: &str) -> StorageResult<Option<Session>>;

    async fn delete_session(&self, token: &str) -> StorageResult<()>;

    /// Insert a new business; duplicate SSM number is a conflict.
    async fn create_business(&self, business: Business) -> StorageResult<()>;

    async fn get_business(&self, id: &BusinessId) -> StorageResult<Option<Business>>;

    async fn get_business_by_ssm(&self, ssm_number: &str) -> StorageResult<Option<Business>>;

    /// Businesses the user is a member of, newest first.
    async fn list_businesses_for_user(&self, user: &UserId) -> StorageResult<Vec<Business>>;

    /// Insert a membership; an existing membership is a conflict.
    async fn add_member(&self, member: BusinessMember) -> StorageResult<()>;

    async fn get_member(
        &self,
        business: &BusinessId,
        user: &UserId,
    ) -> StorageResult<Option<BusinessMember>>;

    async fn list_members(&self, business: &BusinessId) -> StorageResult<Vec<BusinessMember>>;

    async fn create_invitation(&self, invitation: TeamInvitation) -> StorageResult<()>;

    async fn get_invitation(&self, id: &InvitationId) -> StorageResult<Option<TeamInvitation>>;

    async fn get_invitation_by_token(&self, token: &str)
        -> StorageResult<Option<TeamInvitation>>;

    /// Replace a stored invitation record.
    async fn update_invitation(&self, invitation: TeamInvitation) -> StorageResult<()>;

    /// Invitations for a business, newest first.
    async fn list_invitations(
        &self,
        business: &BusinessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<TeamInvitation>>;
}

/// Storage interface for uploaded document metadata.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: DocumentRecord) -> StorageResult<()>;

    async fn get_document(&self, id: &DocumentId) -> StorageResult<Option<DocumentRecord>>;

    /// Replace a stored document record.
    async fn update_document(&self, document: DocumentRecord) -> StorageResult<()>;

    async fn list_documents_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<DocumentRecord>>;

    /// Documents uploaded by one account, newest first.
    async fn list_documents_for_owner(
        &self,
        owner: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<DocumentRecord>>;
}

/// Storage interface for permit applications.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert_project(&self, project: Project) -> StorageResult<()>;

    async fn get_project(&self, id: &ProjectId) -> StorageResult<Option<Project>>;

    /// Replace a stored project record.
    async fn update_project(&self, project: Project) -> StorageResult<()>;

    /// Applications created by one account, newest first.
    async fn list_projects_for_applicant(
        &self,
        applicant: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>>;

    /// Applications filed under one business, newest first.
    async fn list_projects_for_business(
        &self,
        business: &BusinessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>>;

    /// Applications of one module currently inside the review chain.
    async fn list_projects_in_review(
        &self,
        module: &str,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>>;
}

/// Storage interface for stage configuration and review history.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Insert or replace a stage, keyed by module and name.
    async fn upsert_stage(&self, stage: ReviewStage) -> StorageResult<()>;

    async fn get_stage(
        &self,
        module: &str,
        name: &StageName,
    ) -> StorageResult<Option<ReviewStage>>;

    /// All stages of a module in ordinal order.
    async fn list_stages(&self, module: &str) -> StorageResult<Vec<ReviewStage>>;

    /// Append one decision to the review history.
    async fn append_review(&self, record: ReviewRecord) -> StorageResult<()>;

    /// Review history of a project, oldest first.
    async fn list_reviews_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<ReviewRecord>>;
}

/// Storage interface for invoices.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn insert_invoice(&self, invoice: Invoice) -> StorageResult<()>;

    async fn get_invoice(&self, id: &InvoiceId) -> StorageResult<Option<Invoice>>;

    /// Replace a stored invoice record.
    async fn update_invoice(&self, invoice: Invoice) -> StorageResult<()>;

    /// Look an invoice up by its MBMB payment reference.
    async fn find_invoice_by_reference(&self, reference: &str)
        -> StorageResult<Option<Invoice>>;

    /// Invoices of a project, newest first.
    async fn list_invoices_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<Invoice>>;
}

/// Storage interface for device tokens, notifications, and OTP challenges.
#[async_trait]
pub trait NotifyStore: Send + Sync {
    /// Insert or refresh a device token, keyed by user and token.
    async fn upsert_device_token(&self, token: DeviceToken) -> StorageResult<()>;

    async fn list_device_tokens(&self, user: &UserId) -> StorageResult<Vec<DeviceToken>>;

    async fn enqueue_notification(&self, notification: Notification) -> StorageResult<()>;

    /// Notifications for one account, newest first.
    async fn list_notifications_for_user(
        &self,
        user: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>>;

    /// Undelivered notifications, oldest first.
    async fn list_queued_notifications(
        &self,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>>;

    /// Replace a stored notification record.
    async fn update_notification(&self, notification: Notification) -> StorageResult<()>;

    /// Insert or replace the challenge for a phone number.
    async fn upsert_otp_challenge(&self, challenge: OtpChallenge) -> StorageResult<()>;

    async fn get_otp_challenge(&self, phone: &str) -> StorageResult<Option<OtpChallenge>>;

    async fn delete_otp_challenge(&self, phone: &str) -> StorageResult<()>;
}

/// Storage interface for append-only audit events.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an event and return the canonical, hash-linked stored record.
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditEvent>;

    /// Read events newest-first.
    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditEvent>>;

    /// Get the latest audit hash anchor.
    async fn latest_audit_hash(&self) -> StorageResult<Option<String>>;
}

/// Unified storage bundle used by the gateway and services.
pub trait PlatformStore:
    AccountStore
    + DocumentStore
    + ProjectStore
    + ReviewStore
    + BillingStore
    + NotifyStore
    + AuditStore
    + Send
    + Sync
{
}

impl<T> PlatformStore for T where
    T: AccountStore
        + DocumentStore
        + ProjectStore
        + ReviewStore
        + BillingStore
        + NotifyStore
        + AuditStore
        + Send
        + Sync
{
}
