//! PostgreSQL adapter for OneStop storage.
//!
//! This adapter is the transactional source-of-truth backend. Schema is
//! created on connect with idempotent DDL; unique violations surface as
//! `StorageError::Conflict`.

use crate::model::{compute_audit_hash, AuditAppend, AuditEvent};
use crate::traits::{
    AccountStore, AuditStore, BillingStore, DocumentStore, NotifyStore, ProjectStore, QueryWindow,
    ReviewStore,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use onestop_types::{
    Business, BusinessId, BusinessMember, BusinessRole, Credential, DevicePlatform, DeviceToken,
    DocumentId, DocumentRecord, DocumentStatus, InvitationId, InvitationStatus, Invoice,
    InvoiceId, InvoiceKind, InvoiceStatus, Notification, NotificationId, NotificationStatus,
    OtpChallenge, PlatformRole, Project, ProjectId, ProjectStatus, ReviewDecision, ReviewRecord,
    ReviewStage, Session, StageName, TeamInvitation, UserAccount, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Acquire, Row};
use uuid::Uuid;

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS onestop_users (
                id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL UNIQUE,
                ic_number TEXT NOT NULL,
                role TEXT NOT NULL,
                phone_verified BOOLEAN NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_credentials (
                user_id TEXT PRIMARY KEY,
                salt TEXT NOT NULL,
                digest TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_businesses (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                ssm_number TEXT NOT NULL UNIQUE,
                owner_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_business_members (
                business_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                joined_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (business_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_invitations (
                id TEXT PRIMARY KEY,
                business_id TEXT NOT NULL,
                email TEXT NOT NULL,
                role TEXT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                invited_by TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_documents (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                project_id TEXT,
                file_name TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size_bytes BIGINT NOT NULL,
                checksum TEXT NOT NULL,
                storage_key TEXT NOT NULL,
                status TEXT NOT NULL,
                reject_reason TEXT,
                verified_by TEXT,
                decided_at TIMESTAMPTZ,
                uploaded_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_projects (
                id TEXT PRIMARY KEY,
                module TEXT NOT NULL,
                applicant_id TEXT NOT NULL,
                business_id TEXT NOT NULL,
                title TEXT NOT NULL,
                site_address TEXT NOT NULL,
                status TEXT NOT NULL,
                current_stage TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                submitted_at TIMESTAMPTZ,
                decided_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_review_stages (
                module TEXT NOT NULL,
                name TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                enabled BOOLEAN NOT NULL,
                reviewers JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (module, name)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_review_records (
                id BIGSERIAL PRIMARY KEY,
                project_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                decision TEXT NOT NULL,
                reviewer_email TEXT NOT NULL,
                remarks TEXT,
                decided_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_invoices (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount_sen BIGINT NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL,
                mbmb_reference TEXT UNIQUE,
                receipt_no TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                paid_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_device_tokens (
                user_id TEXT NOT NULL,
                token TEXT NOT NULL,
                platform TEXT NOT NULL,
                registered_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (user_id, token)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                data JSONB NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                sent_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_otp_challenges (
                phone TEXT PRIMARY KEY,
                code_hash TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS onestop_audit_events (
                event_id TEXT PRIMARY KEY,
                sequence BIGINT NOT NULL UNIQUE,
                timestamp TIMESTAMPTZ NOT NULL,
                actor TEXT NOT NULL,
                action TEXT NOT NULL,
                subject TEXT NOT NULL,
                success BOOLEAN NOT NULL,
                message TEXT NOT NULL,
                payload JSONB NOT NULL,
                previous_hash TEXT,
                hash TEXT NOT NULL
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn create_user(&self, user: UserAccount) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_users
                (id, full_name, email, phone, ic_number, role, phone_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.0.clone())
        .bind(user.full_name)
        .bind(user.email)
        .bind(user.phone)
        .bind(user.ic_number)
        .bind(user.role.as_str())
        .bind(user.phone_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<UserAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, email, phone, ic_number, role, phone_verified, created_at, updated_at
              FROM onestop_users
             WHERE id = $1
            "#,
        )
        .bind(id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(user_row_to_record).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<UserAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, email, phone, ic_number, role, phone_verified, created_at, updated_at
              FROM onestop_users
             WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(user_row_to_record).transpose()
    }

    async fn get_user_by_phone(&self, phone: &str) -> StorageResult<Option<UserAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, email, phone, ic_number, role, phone_verified, created_at, updated_at
              FROM onestop_users
             WHERE phone = $1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(user_row_to_record).transpose()
    }

    async fn update_user(&self, user: UserAccount) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE onestop_users
               SET full_name = $1,
                   email = $2,
                   phone = $3,
                   ic_number = $4,
                   role = $5,
                   phone_verified = $6,
                   updated_at = $7
             WHERE id = $8
            "#,
        )
        .bind(user.full_name)
        .bind(user.email)
        .bind(user.phone)
        .bind(user.ic_number)
        .bind(user.role.as_str())
        .bind(user.phone_verified)
        .bind(user.updated_at)
        .bind(user.id.0.clone())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("user {} not found", user.id)));
        }
        Ok(())
    }

    async fn upsert_credential(&self, credential: Credential) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_credentials (user_id, salt, digest, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                salt = EXCLUDED.salt,
                digest = EXCLUDED.digest,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(credential.user_id.0)
        .bind(credential.salt)
        .bind(credential.digest)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn get_credential(&self, user_id: &UserId) -> StorageResult<Option<Credential>> {
        let row = sqlx::query(
            "SELECT user_id, salt, digest, updated_at FROM onestop_credentials WHERE user_id = $1",
        )
        .bind(user_id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(credential_row_to_record).transpose()
    }

    async fn create_session(&self, session: Session) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_sessions (token, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.token)
        .bind(session.user_id.0)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_session(&self, token: &str) -> StorageResult<Option<Session>> {
        let row = sqlx::query(
            "SELECT token, user_id, created_at, expires_at FROM onestop_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(session_row_to_record).transpose()
    }

    async fn delete_session(&self, token: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM onestop_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn create_business(&self, business: Business) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_businesses (id, name, ssm_number, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(business.id.0)
        .bind(business.name)
        .bind(business.ssm_number)
        .bind(business.owner.0)
        .bind(business.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_business(&self, id: &BusinessId) -> StorageResult<Option<Business>> {
        let row = sqlx::query(
            "SELECT id, name, ssm_number, owner_id, created_at FROM onestop_businesses WHERE id = $1",
        )
        .bind(id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(business_row_to_record).transpose()
    }

    async fn get_business_by_ssm(&self, ssm_number: &str) -> StorageResult<Option<Business>> {
        let row = sqlx::query(
            "SELECT id, name, ssm_number, owner_id, created_at FROM onestop_businesses WHERE ssm_number = $1",
        )
        .bind(ssm_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(business_row_to_record).transpose()
    }

    async fn list_businesses_for_user(&self, user: &UserId) -> StorageResult<Vec<Business>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.name, b.ssm_number, b.owner_id, b.created_at
              FROM onestop_businesses b
              JOIN onestop_business_members m ON m.business_id = b.id
             WHERE m.user_id = $1
             ORDER BY b.created_at DESC
            "#,
        )
        .bind(user.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(business_row_to_record).collect()
    }

    async fn add_member(&self, member: BusinessMember) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_business_members (business_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(member.business_id.0)
        .bind(member.user_id.0)
        .bind(member.role.as_str())
        .bind(member.joined_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_member(
        &self,
        business: &BusinessId,
        user: &UserId,
    ) -> StorageResult<Option<BusinessMember>> {
        let row = sqlx::query(
            r#"
            SELECT business_id, user_id, role, joined_at
              FROM onestop_business_members
             WHERE business_id = $1 AND user_id = $2
            "#,
        )
        .bind(business.0.clone())
        .bind(user.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(member_row_to_record).transpose()
    }

    async fn list_members(&self, business: &BusinessId) -> StorageResult<Vec<BusinessMember>> {
        let rows = sqlx::query(
            r#"
            SELECT business_id, user_id, role, joined_at
              FROM onestop_business_members
             WHERE business_id = $1
             ORDER BY joined_at ASC
            "#,
        )
        .bind(business.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(member_row_to_record).collect()
    }

    async fn create_invitation(&self, invitation: TeamInvitation) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_invitations
                (id, business_id, email, role, token, status, invited_by, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(invitation.id.0)
        .bind(invitation.business_id.0)
        .bind(invitation.email)
        .bind(invitation.role.as_str())
        .bind(invitation.token)
        .bind(invitation.status.as_str())
        .bind(invitation.invited_by.0)
        .bind(invitation.created_at)
        .bind(invitation.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_invitation(&self, id: &InvitationId) -> StorageResult<Option<TeamInvitation>> {
        let row = sqlx::query(
            r#"
            SELECT id, business_id, email, role, token, status, invited_by, created_at, expires_at
              FROM onestop_invitations
             WHERE id = $1
            "#,
        )
        .bind(id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(invitation_row_to_record).transpose()
    }

    async fn get_invitation_by_token(
        &self,
        token: &str,
    ) -> StorageResult<Option<TeamInvitation>> {
        let row = sqlx::query(
            r#"
            SELECT id, business_id, email, role, token, status, invited_by, created_at, expires_at
              FROM onestop_invitations
             WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(invitation_row_to_record).transpose()
    }

    async fn update_invitation(&self, invitation: TeamInvitation) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE onestop_invitations
               SET email = $1,
                   role = $2,
                   status = $3,
                   expires_at = $4
             WHERE id = $5
            "#,
        )
        .bind(invitation.email)
        .bind(invitation.role.as_str())
        .bind(invitation.status.as_str())
        .bind(invitation.expires_at)
        .bind(invitation.id.0.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "invitation {} not found",
                invitation.id
            )));
        }
        Ok(())
    }

    async fn list_invitations(
        &self,
        business: &BusinessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<TeamInvitation>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT id, business_id, email, role, token, status, invited_by, created_at, expires_at
                  FROM onestop_invitations
                 WHERE business_id = $1
                 ORDER BY created_at DESC
                 OFFSET $2
                "#,
            )
            .bind(business.0.clone())
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT id, business_id, email, role, token, status, invited_by, created_at, expires_at
                  FROM onestop_invitations
                 WHERE business_id = $1
                 ORDER BY created_at DESC
                 LIMIT $2 OFFSET $3
                "#,
            )
            .bind(business.0.clone())
            .bind(to_i64(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        rows.into_iter().map(invitation_row_to_record).collect()
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert_document(&self, document: DocumentRecord) -> StorageResult<()> {
        let (status, reject_reason) = document_status_to_columns(&document.status);
        sqlx::query(
            r#"
            INSERT INTO onestop_documents
                (id, owner_id, project_id, file_name, content_type, size_bytes, checksum,
                 storage_key, status, reject_reason, verified_by, decided_at, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(document.id.0)
        .bind(document.owner.0)
        .bind(document.project_id.map(|p| p.0))
        .bind(document.file_name)
        .bind(document.content_type)
        .bind(to_i64_size(document.size_bytes)?)
        .bind(document.checksum)
        .bind(document.storage_key)
        .bind(status)
        .bind(reject_reason)
        .bind(document.verified_by.map(|u| u.0))
        .bind(document.decided_at)
        .bind(document.uploaded_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> StorageResult<Option<DocumentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, project_id, file_name, content_type, size_bytes, checksum,
                   storage_key, status, reject_reason, verified_by, decided_at, uploaded_at
              FROM onestop_documents
             WHERE id = $1
            "#,
        )
        .bind(id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(document_row_to_record).transpose()
    }

    async fn update_document(&self, document: DocumentRecord) -> StorageResult<()> {
        let (status, reject_reason) = document_status_to_columns(&document.status);
        let result = sqlx::query(
            r#"
            UPDATE onestop_documents
               SET project_id = $1,
                   status = $2,
                   reject_reason = $3,
                   verified_by = $4,
                   decided_at = $5
             WHERE id = $6
            "#,
        )
        .bind(document.project_id.map(|p| p.0))
        .bind(status)
        .bind(reject_reason)
        .bind(document.verified_by.map(|u| u.0))
        .bind(document.decided_at)
        .bind(document.id.0.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "document {} not found",
                document.id
            )));
        }
        Ok(())
    }

    async fn list_documents_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, project_id, file_name, content_type, size_bytes, checksum,
                   storage_key, status, reject_reason, verified_by, decided_at, uploaded_at
              FROM onestop_documents
             WHERE project_id = $1
             ORDER BY uploaded_at ASC
            "#,
        )
        .bind(project.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(document_row_to_record).collect()
    }

    async fn list_documents_for_owner(
        &self,
        owner: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<DocumentRecord>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT id, owner_id, project_id, file_name, content_type, size_bytes, checksum,
                       storage_key, status, reject_reason, verified_by, decided_at, uploaded_at
                  FROM onestop_documents
                 WHERE owner_id = $1
                 ORDER BY uploaded_at DESC
                 OFFSET $2
                "#,
            )
            .bind(owner.0.clone())
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT id, owner_id, project_id, file_name, content_type, size_bytes, checksum,
                       storage_key, status, reject_reason, verified_by, decided_at, uploaded_at
                  FROM onestop_documents
                 WHERE owner_id = $1
                 ORDER BY uploaded_at DESC
                 LIMIT $2 OFFSET $3
                "#,
            )
            .bind(owner.0.clone())
            .bind(to_i64(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        rows.into_iter().map(document_row_to_record).collect()
    }
}

#[async_trait]
impl ProjectStore for PostgresStore {
    async fn insert_project(&self, project: Project) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_projects
                (id, module, applicant_id, business_id, title, site_address, status,
                 current_stage, created_at, updated_at, submitted_at, decided_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(project.id.0)
        .bind(project.module)
        .bind(project.applicant.0)
        .bind(project.business_id.0)
        .bind(project.title)
        .bind(project.site_address)
        .bind(project.status.as_str())
        .bind(project.current_stage.map(|s| s.0))
        .bind(project.created_at)
        .bind(project.updated_at)
        .bind(project.submitted_at)
        .bind(project.decided_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_project(&self, id: &ProjectId) -> StorageResult<Option<Project>> {
        let row = sqlx::query(
            r#"
            SELECT id, module, applicant_id, business_id, title, site_address, status,
                   current_stage, created_at, updated_at, submitted_at, decided_at
              FROM onestop_projects
             WHERE id = $1
            "#,
        )
        .bind(id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(project_row_to_record).transpose()
    }

    async fn update_project(&self, project: Project) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE onestop_projects
               SET title = $1,
                   site_address = $2,
                   status = $3,
                   current_stage = $4,
                   updated_at = $5,
                   submitted_at = $6,
                   decided_at = $7
             WHERE id = $8
            "#,
        )
        .bind(project.title)
        .bind(project.site_address)
        .bind(project.status.as_str())
        .bind(project.current_stage.map(|s| s.0))
        .bind(project.updated_at)
        .bind(project.submitted_at)
        .bind(project.decided_at)
        .bind(project.id.0.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "project {} not found",
                project.id
            )));
        }
        Ok(())
    }

    async fn list_projects_for_applicant(
        &self,
        applicant: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT id, module, applicant_id, business_id, title, site_address, status,
                       current_stage, created_at, updated_at, submitted_at, decided_at
                  FROM onestop_projects
                 WHERE applicant_id = $1
                 ORDER BY created_at DESC
                 OFFSET $2
                "#,
            )
            .bind(applicant.0.clone())
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT id, module, applicant_id, business_id, title, site_address, status,
                       current_stage, created_at, updated_at, submitted_at, decided_at
                  FROM onestop_projects
                 WHERE applicant_id = $1
                 ORDER BY created_at DESC
                 LIMIT $2 OFFSET $3
                "#,
            )
            .bind(applicant.0.clone())
            .bind(to_i64(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        rows.into_iter().map(project_row_to_record).collect()
    }

    async fn list_projects_for_business(
        &self,
        business: &BusinessId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT id, module, applicant_id, business_id, title, site_address, status,
                       current_stage, created_at, updated_at, submitted_at, decided_at
                  FROM onestop_projects
                 WHERE business_id = $1
                 ORDER BY created_at DESC
                 OFFSET $2
                "#,
            )
            .bind(business.0.clone())
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT id, module, applicant_id, business_id, title, site_address, status,
                       current_stage, created_at, updated_at, submitted_at, decided_at
                  FROM onestop_projects
                 WHERE business_id = $1
                 ORDER BY created_at DESC
                 LIMIT $2 OFFSET $3
                "#,
            )
            .bind(business.0.clone())
            .bind(to_i64(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        rows.into_iter().map(project_row_to_record).collect()
    }

    async fn list_projects_in_review(
        &self,
        module: &str,
        window: QueryWindow,
    ) -> StorageResult<Vec<Project>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT id, module, applicant_id, business_id, title, site_address, status,
                       current_stage, created_at, updated_at, submitted_at, decided_at
                  FROM onestop_projects
                 WHERE module = $1 AND status = 'in_review'
                 ORDER BY submitted_at ASC
                 OFFSET $2
                "#,
            )
            .bind(module)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT id, module, applicant_id, business_id, title, site_address, status,
                       current_stage, created_at, updated_at, submitted_at, decided_at
                  FROM onestop_projects
                 WHERE module = $1 AND status = 'in_review'
                 ORDER BY submitted_at ASC
                 LIMIT $2 OFFSET $3
                "#,
            )
            .bind(module)
            .bind(to_i64(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        rows.into_iter().map(project_row_to_record).collect()
    }
}

#[async_trait]
impl ReviewStore for PostgresStore {
    async fn upsert_stage(&self, stage: ReviewStage) -> StorageResult<()> {
        let reviewers = serde_json::to_value(&stage.reviewers)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO onestop_review_stages (module, name, ordinal, enabled, reviewers, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (module, name) DO UPDATE SET
                ordinal = EXCLUDED.ordinal,
                enabled = EXCLUDED.enabled,
                reviewers = EXCLUDED.reviewers,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(stage.module)
        .bind(stage.name.0)
        .bind(stage.ordinal as i32)
        .bind(stage.enabled)
        .bind(reviewers)
        .bind(stage.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn get_stage(
        &self,
        module: &str,
        name: &StageName,
    ) -> StorageResult<Option<ReviewStage>> {
        let row = sqlx::query(
            r#"
            SELECT module, name, ordinal, enabled, reviewers, updated_at
              FROM onestop_review_stages
             WHERE module = $1 AND name = $2
            "#,
        )
        .bind(module)
        .bind(name.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(stage_row_to_record).transpose()
    }

    async fn list_stages(&self, module: &str) -> StorageResult<Vec<ReviewStage>> {
        let rows = sqlx::query(
            r#"
            SELECT module, name, ordinal, enabled, reviewers, updated_at
              FROM onestop_review_stages
             WHERE module = $1
             ORDER BY ordinal ASC
            "#,
        )
        .bind(module)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(stage_row_to_record).collect()
    }

    async fn append_review(&self, record: ReviewRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_review_records
                (project_id, stage, decision, reviewer_email, remarks, decided_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.project_id.0)
        .bind(record.stage.0)
        .bind(record.decision.as_str())
        .bind(record.reviewer_email)
        .bind(record.remarks)
        .bind(record.decided_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn list_reviews_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<ReviewRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT project_id, stage, decision, reviewer_email, remarks, decided_at
              FROM onestop_review_records
             WHERE project_id = $1
             ORDER BY decided_at ASC, id ASC
            "#,
        )
        .bind(project.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(review_row_to_record).collect()
    }
}

#[async_trait]
impl BillingStore for PostgresStore {
    async fn insert_invoice(&self, invoice: Invoice) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_invoices
                (id, project_id, kind, amount_sen, currency, status, mbmb_reference,
                 receipt_no, created_at, updated_at, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(invoice.id.0)
        .bind(invoice.project_id.0)
        .bind(invoice.kind.as_str())
        .bind(invoice.amount_sen)
        .bind(invoice.currency)
        .bind(invoice.status.as_str())
        .bind(invoice.mbmb_reference)
        .bind(invoice.receipt_no)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .bind(invoice.paid_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_invoice(&self, id: &InvoiceId) -> StorageResult<Option<Invoice>> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, kind, amount_sen, currency, status, mbmb_reference,
                   receipt_no, created_at, updated_at, paid_at
              FROM onestop_invoices
             WHERE id = $1
            "#,
        )
        .bind(id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(invoice_row_to_record).transpose()
    }

    async fn update_invoice(&self, invoice: Invoice) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE onestop_invoices
               SET status = $1,
                   mbmb_reference = $2,
                   receipt_no = $3,
                   updated_at = $4,
                   paid_at = $5
             WHERE id = $6
            "#,
        )
        .bind(invoice.status.as_str())
        .bind(invoice.mbmb_reference)
        .bind(invoice.receipt_no)
        .bind(invoice.updated_at)
        .bind(invoice.paid_at)
        .bind(invoice.id.0.clone())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "invoice {} not found",
                invoice.id
            )));
        }
        Ok(())
    }

    async fn find_invoice_by_reference(
        &self,
        reference: &str,
    ) -> StorageResult<Option<Invoice>> {
        let row = sqlx::query(
            r#"
            SELECT id, project_id, kind, amount_sen, currency, status, mbmb_reference,
                   receipt_no, created_at, updated_at, paid_at
              FROM onestop_invoices
             WHERE mbmb_reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(invoice_row_to_record).transpose()
    }

    async fn list_invoices_for_project(
        &self,
        project: &ProjectId,
    ) -> StorageResult<Vec<Invoice>> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, kind, amount_sen, currency, status, mbmb_reference,
                   receipt_no, created_at, updated_at, paid_at
              FROM onestop_invoices
             WHERE project_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(project.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(invoice_row_to_record).collect()
    }
}

#[async_trait]
impl NotifyStore for PostgresStore {
    async fn upsert_device_token(&self, token: DeviceToken) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_device_tokens (user_id, token, platform, registered_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, token) DO UPDATE SET
                platform = EXCLUDED.platform,
                registered_at = EXCLUDED.registered_at
            "#,
        )
        .bind(token.user_id.0)
        .bind(token.token)
        .bind(token.platform.as_str())
        .bind(token.registered_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn list_device_tokens(&self, user: &UserId) -> StorageResult<Vec<DeviceToken>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, token, platform, registered_at
              FROM onestop_device_tokens
             WHERE user_id = $1
             ORDER BY registered_at ASC
            "#,
        )
        .bind(user.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(device_token_row_to_record).collect()
    }

    async fn enqueue_notification(&self, notification: Notification) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_notifications
                (id, user_id, title, body, data, status, attempts, created_at, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(notification.id.0)
        .bind(notification.user_id.0)
        .bind(notification.title)
        .bind(notification.body)
        .bind(notification.data)
        .bind(notification.status.as_str())
        .bind(notification.attempts as i32)
        .bind(notification.created_at)
        .bind(notification.sent_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn list_notifications_for_user(
        &self,
        user: &UserId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT id, user_id, title, body, data, status, attempts, created_at, sent_at
                  FROM onestop_notifications
                 WHERE user_id = $1
                 ORDER BY created_at DESC
                 OFFSET $2
                "#,
            )
            .bind(user.0.clone())
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT id, user_id, title, body, data, status, attempts, created_at, sent_at
                  FROM onestop_notifications
                 WHERE user_id = $1
                 ORDER BY created_at DESC
                 LIMIT $2 OFFSET $3
                "#,
            )
            .bind(user.0.clone())
            .bind(to_i64(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        rows.into_iter().map(notification_row_to_record).collect()
    }

    async fn list_queued_notifications(
        &self,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT id, user_id, title, body, data, status, attempts, created_at, sent_at
                  FROM onestop_notifications
                 WHERE status = 'queued'
                 ORDER BY created_at ASC
                 OFFSET $1
                "#,
            )
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT id, user_id, title, body, data, status, attempts, created_at, sent_at
                  FROM onestop_notifications
                 WHERE status = 'queued'
                 ORDER BY created_at ASC
                 LIMIT $1 OFFSET $2
                "#,
            )
            .bind(to_i64(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        rows.into_iter().map(notification_row_to_record).collect()
    }

    async fn update_notification(&self, notification: Notification) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE onestop_notifications
               SET status = $1,
                   attempts = $2,
                   sent_at = $3
             WHERE id = $4
            "#,
        )
        .bind(notification.status.as_str())
        .bind(notification.attempts as i32)
        .bind(notification.sent_at)
        .bind(notification.id.0.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "notification {} not found",
                notification.id
            )));
        }
        Ok(())
    }

    async fn upsert_otp_challenge(&self, challenge: OtpChallenge) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onestop_otp_challenges (phone, code_hash, attempts, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (phone) DO UPDATE SET
                code_hash = EXCLUDED.code_hash,
                attempts = EXCLUDED.attempts,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(challenge.phone)
        .bind(challenge.code_hash)
        .bind(challenge.attempts as i32)
        .bind(challenge.created_at)
        .bind(challenge.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn get_otp_challenge(&self, phone: &str) -> StorageResult<Option<OtpChallenge>> {
        let row = sqlx::query(
            r#"
            SELECT phone, code_hash, attempts, created_at, expires_at
              FROM onestop_otp_challenges
             WHERE phone = $1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(otp_row_to_record).transpose()
    }

    async fn delete_otp_challenge(&self, phone: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM onestop_otp_challenges WHERE phone = $1")
            .bind(phone)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PostgresStore {
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditEvent> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let conn = tx
            .acquire()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        sqlx::query("LOCK TABLE onestop_audit_events IN EXCLUSIVE MODE")
            .execute(&mut *conn)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let last = sqlx::query(
            "SELECT sequence, hash FROM onestop_audit_events ORDER BY sequence DESC LIMIT 1",
        )
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        let (sequence, previous_hash) = if let Some(row) = last {
            let seq: i64 = row
                .try_get("sequence")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            let prev: String = row
                .try_get("hash")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            (seq + 1, Some(prev))
        } else {
            (1_i64, None)
        };

        let hash = compute_audit_hash(&event, previous_hash.as_deref(), sequence as u64)?;
        let event_id = format!("audit-{}", Uuid::new_v4());

        sqlx::query(
            r#"
            INSERT INTO onestop_audit_events
                (event_id, sequence, timestamp, actor, action, subject, success, message, payload, previous_hash, hash)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event_id.clone())
        .bind(sequence)
        .bind(event.timestamp)
        .bind(event.actor.clone())
        .bind(event.action.clone())
        .bind(event.subject.clone())
        .bind(event.success)
        .bind(event.message.clone())
        .bind(event.payload.clone())
        .bind(previous_hash.clone())
        .bind(hash.clone())
        .execute(&mut *conn)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(AuditEvent {
            event_id,
            sequence: sequence as u64,
            timestamp: event.timestamp,
            actor: event.actor,
            action: event.action,
            subject: event.subject,
            success: event.success,
            message: event.message,
            payload: event.payload,
            previous_hash,
            hash,
        })
    }

    async fn list_audit(&self, window: QueryWindow) -> StorageResult<Vec<AuditEvent>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT event_id, sequence, timestamp, actor, action, subject, success, message, payload, previous_hash, hash
                  FROM onestop_audit_events
                 ORDER BY sequence DESC
                 OFFSET $1
                "#,
            )
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            sqlx::query(
                r#"
                SELECT event_id, sequence, timestamp, actor, action, subject, success, message, payload, previous_hash, hash
                  FROM onestop_audit_events
                 ORDER BY sequence DESC
                 LIMIT $1 OFFSET $2
                "#,
            )
            .bind(to_i64(window.limit)?)
            .bind(to_i64(window.offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        rows.into_iter().map(audit_row_to_record).collect()
    }

    async fn latest_audit_hash(&self) -> StorageResult<Option<String>> {
        let row =
            sqlx::query("SELECT hash FROM onestop_audit_events ORDER BY sequence DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(row
            .map(|r| r.try_get::<String, _>("hash"))
            .transpose()
            .map_err(|e| StorageError::Backend(e.to_string()))?)
    }
}

// ── Row mappers ──────────────────────────────────────────────────────

fn user_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<UserAccount> {
    let role: String = row
        .try_get("role")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(UserAccount {
        id: UserId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        full_name: row
            .try_get("full_name")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        email: row
            .try_get("email")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        phone: row
            .try_get("phone")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        ic_number: row
            .try_get("ic_number")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        role: PlatformRole::parse(&role)
            .ok_or_else(|| StorageError::Serialization(format!("unknown role `{role}`")))?,
        phone_verified: row
            .try_get("phone_verified")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn credential_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<Credential> {
    Ok(Credential {
        user_id: UserId::new(
            row.try_get::<String, _>("user_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        salt: row
            .try_get("salt")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        digest: row
            .try_get("digest")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn session_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<Session> {
    Ok(Session {
        token: row
            .try_get("token")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        user_id: UserId::new(
            row.try_get::<String, _>("user_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn business_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<Business> {
    Ok(Business {
        id: BusinessId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        name: row
            .try_get("name")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        ssm_number: row
            .try_get("ssm_number")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        owner: UserId::new(
            row.try_get::<String, _>("owner_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn member_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<BusinessMember> {
    let role: String = row
        .try_get("role")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(BusinessMember {
        business_id: BusinessId::new(
            row.try_get::<String, _>("business_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        user_id: UserId::new(
            row.try_get::<String, _>("user_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        role: BusinessRole::parse(&role)
            .ok_or_else(|| StorageError::Serialization(format!("unknown role `{role}`")))?,
        joined_at: row
            .try_get("joined_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn invitation_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<TeamInvitation> {
    let role: String = row
        .try_get("role")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(TeamInvitation {
        id: InvitationId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        business_id: BusinessId::new(
            row.try_get::<String, _>("business_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        email: row
            .try_get("email")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        role: BusinessRole::parse(&role)
            .ok_or_else(|| StorageError::Serialization(format!("unknown role `{role}`")))?,
        token: row
            .try_get("token")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        status: InvitationStatus::parse(&status)
            .ok_or_else(|| StorageError::Serialization(format!("unknown status `{status}`")))?,
        invited_by: UserId::new(
            row.try_get::<String, _>("invited_by")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn document_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<DocumentRecord> {
    let status: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let reject_reason: Option<String> = row
        .try_get("reject_reason")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let project_id: Option<String> = row
        .try_get("project_id")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let verified_by: Option<String> = row
        .try_get("verified_by")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let size_bytes: i64 = row
        .try_get("size_bytes")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(DocumentRecord {
        id: DocumentId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        owner: UserId::new(
            row.try_get::<String, _>("owner_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        project_id: project_id.map(ProjectId::new),
        file_name: row
            .try_get("file_name")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        content_type: row
            .try_get("content_type")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        size_bytes: size_bytes as u64,
        checksum: row
            .try_get("checksum")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        storage_key: row
            .try_get("storage_key")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        status: document_status_from_columns(&status, reject_reason)?,
        verified_by: verified_by.map(UserId::new),
        decided_at: row
            .try_get("decided_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        uploaded_at: row
            .try_get("uploaded_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn project_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<Project> {
    let status: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let current_stage: Option<String> = row
        .try_get("current_stage")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(Project {
        id: ProjectId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        module: row
            .try_get("module")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        applicant: UserId::new(
            row.try_get::<String, _>("applicant_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        business_id: BusinessId::new(
            row.try_get::<String, _>("business_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        title: row
            .try_get("title")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        site_address: row
            .try_get("site_address")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        status: ProjectStatus::parse(&status)
            .ok_or_else(|| StorageError::Serialization(format!("unknown status `{status}`")))?,
        current_stage: current_stage.map(StageName::new),
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        submitted_at: row
            .try_get("submitted_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        decided_at: row
            .try_get("decided_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn stage_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<ReviewStage> {
    let reviewers_json: serde_json::Value = row
        .try_get("reviewers")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let reviewers: Vec<String> = serde_json::from_value(reviewers_json)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    let ordinal: i32 = row
        .try_get("ordinal")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(ReviewStage {
        module: row
            .try_get("module")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        name: StageName::new(
            row.try_get::<String, _>("name")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        ordinal: ordinal as u32,
        enabled: row
            .try_get("enabled")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        reviewers,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn review_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<ReviewRecord> {
    let decision: String = row
        .try_get("decision")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(ReviewRecord {
        project_id: ProjectId::new(
            row.try_get::<String, _>("project_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        stage: StageName::new(
            row.try_get::<String, _>("stage")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        decision: ReviewDecision::parse(&decision).ok_or_else(|| {
            StorageError::Serialization(format!("unknown decision `{decision}`"))
        })?,
        reviewer_email: row
            .try_get("reviewer_email")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        remarks: row
            .try_get("remarks")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        decided_at: row
            .try_get("decided_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn invoice_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<Invoice> {
    let kind: String = row
        .try_get("kind")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(Invoice {
        id: InvoiceId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        project_id: ProjectId::new(
            row.try_get::<String, _>("project_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        kind: InvoiceKind::parse(&kind)
            .ok_or_else(|| StorageError::Serialization(format!("unknown kind `{kind}`")))?,
        amount_sen: row
            .try_get("amount_sen")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        currency: row
            .try_get("currency")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        status: InvoiceStatus::parse(&status)
            .ok_or_else(|| StorageError::Serialization(format!("unknown status `{status}`")))?,
        mbmb_reference: row
            .try_get("mbmb_reference")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        receipt_no: row
            .try_get("receipt_no")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        paid_at: row
            .try_get("paid_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn device_token_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<DeviceToken> {
    let platform: String = row
        .try_get("platform")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(DeviceToken {
        user_id: UserId::new(
            row.try_get::<String, _>("user_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        token: row
            .try_get("token")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        platform: DevicePlatform::parse(&platform).ok_or_else(|| {
            StorageError::Serialization(format!("unknown platform `{platform}`"))
        })?,
        registered_at: row
            .try_get("registered_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn notification_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<Notification> {
    let status: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let attempts: i32 = row
        .try_get("attempts")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(Notification {
        id: NotificationId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        user_id: UserId::new(
            row.try_get::<String, _>("user_id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        title: row
            .try_get("title")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        body: row
            .try_get("body")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        data: row
            .try_get("data")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        status: NotificationStatus::parse(&status)
            .ok_or_else(|| StorageError::Serialization(format!("unknown status `{status}`")))?,
        attempts: attempts as u32,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        sent_at: row
            .try_get("sent_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn otp_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<OtpChallenge> {
    let attempts: i32 = row
        .try_get("attempts")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(OtpChallenge {
        phone: row
            .try_get("phone")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        code_hash: row
            .try_get("code_hash")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        attempts: attempts as u32,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn audit_row_to_record(row: sqlx::postgres::PgRow) -> StorageResult<AuditEvent> {
    Ok(AuditEvent {
        event_id: row
            .try_get("event_id")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        sequence: row
            .try_get::<i64, _>("sequence")
            .map_err(|e| StorageError::Backend(e.to_string()))? as u64,
        timestamp: row
            .try_get("timestamp")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        actor: row
            .try_get("actor")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        action: row
            .try_get("action")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        subject: row
            .try_get("subject")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        success: row
            .try_get("success")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        message: row
            .try_get("message")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        payload: row
            .try_get("payload")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        previous_hash: row
            .try_get("previous_hash")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        hash: row
            .try_get("hash")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

// ── Column helpers ───────────────────────────────────────────────────

fn document_status_to_columns(status: &DocumentStatus) -> (&'static str, Option<String>) {
    match status {
        DocumentStatus::Pending => ("pending", None),
        DocumentStatus::Verified => ("verified", None),
        DocumentStatus::Rejected { reason } => ("rejected", Some(reason.clone())),
    }
}

fn document_status_from_columns(
    raw: &str,
    reject_reason: Option<String>,
) -> StorageResult<DocumentStatus> {
    match raw {
        "pending" => Ok(DocumentStatus::Pending),
        "verified" => Ok(DocumentStatus::Verified),
        "rejected" => Ok(DocumentStatus::Rejected {
            reason: reject_reason.unwrap_or_default(),
        }),
        _ => Err(StorageError::Serialization(format!(
            "unknown document status `{raw}`"
        ))),
    }
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("window value too large".to_string()))
}

fn to_i64_size(value: u64) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("file size too large".to_string()))
}
