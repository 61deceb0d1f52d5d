//! Account service: registration, sessions, businesses and teams.

use crate::error::{AccountError, AccountResult};
use crate::password;
use chrono::Utc;
use onestop_storage::{AuditAppend, PlatformStore, QueryWindow};
use onestop_types::{
    Business, BusinessId, BusinessMember, BusinessRole, Credential, InvitationId,
    InvitationStatus, Notification, PlatformRole, Session, TeamInvitation, UserAccount, UserId,
};
use std::sync::Arc;

/// Tunables for sessions, invitations and password policy
#[derive(Clone, Debug)]
pub struct AccountConfig {
    /// Bearer session lifetime in seconds
    pub session_ttl_secs: i64,
    /// Invitation acceptance window in seconds
    pub invitation_ttl_secs: i64,
    /// Minimum accepted password length
    pub min_password_len: usize,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 24 * 3600,
            invitation_ttl_secs: 7 * 24 * 3600,
            min_password_len: 8,
        }
    }
}

impl AccountConfig {
    pub fn with_session_ttl_secs(mut self, secs: i64) -> Self {
        self.session_ttl_secs = secs;
        self
    }

    pub fn with_invitation_ttl_secs(mut self, secs: i64) -> Self {
        self.invitation_ttl_secs = secs;
        self
    }
}

/// Request to register a new account
#[derive(Clone, Debug)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub ic_number: String,
    pub password: String,
}

/// Request to register a new business
#[derive(Clone, Debug)]
pub struct NewBusiness {
    pub name: String,
    pub ssm_number: String,
}

/// Account service over a platform store
pub struct AccountService<S: ?Sized> {
    store: Arc<S>,
    config: AccountConfig,
}

impl<S: PlatformStore + ?Sized> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, AccountConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: AccountConfig) -> Self {
        Self { store, config }
    }

    // ── Registration and Login ───────────────────────────────────────

    /// Register a new applicant account.
    ///
    /// The account starts with an unverified phone; login stays refused
    /// until OTP verification flips the flag.
    pub async fn register_user(&self, request: NewUser) -> AccountResult<UserAccount> {
        let request = self.validate_new_user(request)?;

        if self
            .store
            .get_user_by_email(&request.email)
            .await?
            .is_some()
        {
            return Err(AccountError::DuplicateEmail(request.email));
        }
        if self
            .store
            .get_user_by_phone(&request.phone)
            .await?
            .is_some()
        {
            return Err(AccountError::DuplicatePhone(request.phone));
        }

        let user = UserAccount::new(
            request.full_name,
            request.email,
            request.phone,
            request.ic_number,
        );
        self.store.create_user(user.clone()).await?;

        let salt = password::generate_salt();
        let digest = password::digest_password(&salt, &request.password);
        self.store
            .upsert_credential(Credential {
                user_id: user.id.clone(),
                salt,
                digest,
                updated_at: Utc::now(),
            })
            .await?;

        self.audit(
            &user.id.0,
            "account_registered",
            &user.id.0,
            true,
            format!("registered {}", user.email),
            serde_json::json!({ "email": user.email, "role": user.role.as_str() }),
        )
        .await?;

        tracing::info!(user_id = %user.id, email = %user.email, "account registered");
        Ok(user)
    }

    /// Register a staff account. Admin only.
    ///
    /// Staff accounts are created pre-verified so officers never pass
    /// through the applicant OTP flow.
    pub async fn register_officer(
        &self,
        actor: &UserAccount,
        request: NewUser,
        role: PlatformRole,
    ) -> AccountResult<UserAccount> {
        if actor.role != PlatformRole::Admin {
            return Err(AccountError::Forbidden(
                "only admins may register staff accounts".to_string(),
            ));
        }
        if !role.is_staff() {
            return Err(AccountError::InvalidInput(
                "staff registration requires an officer or admin role".to_string(),
            ));
        }

        let request = self.validate_new_user(request)?;

        if self
            .store
            .get_user_by_email(&request.email)
            .await?
            .is_some()
        {
            return Err(AccountError::DuplicateEmail(request.email));
        }
        if self
            .store
            .get_user_by_phone(&request.phone)
            .await?
            .is_some()
        {
            return Err(AccountError::DuplicatePhone(request.phone));
        }

        let mut user = UserAccount::new(
            request.full_name,
            request.email,
            request.phone,
            request.ic_number,
        )
        .with_role(role);
        user.verify_phone();
        self.store.create_user(user.clone()).await?;

        let salt = password::generate_salt();
        let digest = password::digest_password(&salt, &request.password);
        self.store
            .upsert_credential(Credential {
                user_id: user.id.clone(),
                salt,
                digest,
                updated_at: Utc::now(),
            })
            .await?;

        self.audit(
            &actor.id.0,
            "staff_registered",
            &user.id.0,
            true,
            format!("registered {} as {}", user.email, role.as_str()),
            serde_json::json!({ "email": user.email, "role": role.as_str() }),
        )
        .await?;

        tracing::info!(user_id = %user.id, role = role.as_str(), "staff account registered");
        Ok(user)
    }

    /// Exchange email and password for a bearer session.
    ///
    /// Fails with [`AccountError::PhoneUnverified`] until the phone has
    /// passed OTP verification. Failed attempts land in the audit trail.
    pub async fn login(&self, email: &str, password: &str) -> AccountResult<Session> {
        let email = normalize_email(email);

        let Some(user) = self.store.get_user_by_email(&email).await? else {
            self.audit(
                &email,
                "login_failed",
                &email,
                false,
                "unknown email".to_string(),
                serde_json::Value::Null,
            )
            .await?;
            return Err(AccountError::InvalidCredentials);
        };

        let Some(credential) = self.store.get_credential(&user.id).await? else {
            return Err(AccountError::InvalidCredentials);
        };
        if !password::verify_password(&credential.salt, &credential.digest, password) {
            self.audit(
                &user.id.0,
                "login_failed",
                &user.id.0,
                false,
                "bad password".to_string(),
                serde_json::Value::Null,
            )
            .await?;
            return Err(AccountError::InvalidCredentials);
        }

        if !user.phone_verified {
            self.audit(
                &user.id.0,
                "login_failed",
                &user.id.0,
                false,
                "phone unverified".to_string(),
                serde_json::Value::Null,
            )
            .await?;
            return Err(AccountError::PhoneUnverified);
        }

        let session = Session::new(user.id.clone(), self.config.session_ttl_secs);
        self.store.create_session(session.clone()).await?;

        self.audit(
            &user.id.0,
            "login",
            &user.id.0,
            true,
            format!("session for {}", user.email),
            serde_json::Value::Null,
        )
        .await?;

        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(session)
    }

    /// Resolve a bearer token to its account.
    ///
    /// Expired sessions are deleted on sight.
    pub async fn authenticate(&self, token: &str) -> AccountResult<UserAccount> {
        let Some(session) = self.store.get_session(token).await? else {
            return Err(AccountError::InvalidSession);
        };
        if session.is_expired() {
            self.store.delete_session(token).await?;
            return Err(AccountError::InvalidSession);
        }
        self.store
            .get_user(&session.user_id)
            .await?
            .ok_or(AccountError::InvalidSession)
    }

    /// Drop a session. Unknown tokens are a no-op.
    pub async fn logout(&self, token: &str) -> AccountResult<()> {
        if let Some(session) = self.store.get_session(token).await? {
            self.store.delete_session(token).await?;
            self.audit(
                &session.user_id.0,
                "logout",
                &session.user_id.0,
                true,
                String::new(),
                serde_json::Value::Null,
            )
            .await?;
        }
        Ok(())
    }

    /// Flip the phone-verified flag after a successful OTP check.
    pub async fn mark_phone_verified(&self, user_id: &UserId) -> AccountResult<UserAccount> {
        let mut user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AccountError::UserNotFound(user_id.clone()))?;
        if user.phone_verified {
            return Ok(user);
        }

        user.verify_phone();
        self.store.update_user(user.clone()).await?;

        self.audit(
            &user.id.0,
            "phone_verified",
            &user.id.0,
            true,
            user.phone.clone(),
            serde_json::Value::Null,
        )
        .await?;

        Ok(user)
    }

    /// Flip verification for whichever account holds the phone. Unknown
    /// phones are a quiet no-op so OTP checks do not probe for accounts.
    pub async fn confirm_phone(&self, phone: &str) -> AccountResult<Option<UserAccount>> {
        let Some(user) = self.store.get_user_by_phone(phone.trim()).await? else {
            return Ok(None);
        };
        Ok(Some(self.mark_phone_verified(&user.id).await?))
    }

    pub async fn get_user(&self, id: &UserId) -> AccountResult<UserAccount> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AccountError::UserNotFound(id.clone()))
    }

    // ── Businesses ───────────────────────────────────────────────────

    /// Register a business and make the actor its owner member.
    pub async fn register_business(
        &self,
        actor: &UserAccount,
        request: NewBusiness,
    ) -> AccountResult<Business> {
        let name = request.name.trim().to_string();
        let ssm_number = request.ssm_number.trim().to_string();
        if name.is_empty() {
            return Err(AccountError::InvalidInput(
                "business name must not be empty".to_string(),
            ));
        }
        if ssm_number.is_empty() {
            return Err(AccountError::InvalidInput(
                "SSM number must not be empty".to_string(),
            ));
        }

        if self.store.get_business_by_ssm(&ssm_number).await?.is_some() {
            return Err(AccountError::DuplicateSsm(ssm_number));
        }

        let business = Business::new(name, ssm_number, actor.id.clone());
        self.store.create_business(business.clone()).await?;
        self.store
            .add_member(BusinessMember::new(
                business.id.clone(),
                actor.id.clone(),
                BusinessRole::Owner,
            ))
            .await?;

        self.audit(
            &actor.id.0,
            "business_registered",
            &business.id.0,
            true,
            format!("{} ({})", business.name, business.ssm_number),
            serde_json::json!({ "ssm_number": business.ssm_number }),
        )
        .await?;

        tracing::info!(business_id = %business.id, ssm = %business.ssm_number, "business registered");
        Ok(business)
    }

    /// List the businesses the user belongs to.
    pub async fn businesses_for(&self, user: &UserId) -> AccountResult<Vec<Business>> {
        Ok(self.store.list_businesses_for_user(user).await?)
    }

    /// List the team of a business. Members only.
    pub async fn list_members(
        &self,
        actor: &UserAccount,
        business: &BusinessId,
    ) -> AccountResult<Vec<BusinessMember>> {
        self.require_member(business, &actor.id).await?;
        Ok(self.store.list_members(business).await?)
    }

    // ── Invitations ──────────────────────────────────────────────────

    /// Invite an email address onto a business team.
    ///
    /// Only owners and managers may invite, and only manager or staff
    /// roles can be granted. If the email already belongs to a platform
    /// account, that account gets a push notification.
    pub async fn invite_member(
        &self,
        actor: &UserAccount,
        business: &BusinessId,
        email: &str,
        role: BusinessRole,
    ) -> AccountResult<TeamInvitation> {
        self.require_manager(business, &actor.id).await?;

        if role == BusinessRole::Owner {
            return Err(AccountError::InvalidInput(
                "ownership cannot be granted by invitation".to_string(),
            ));
        }
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AccountError::InvalidInput(
                "invitee email is not valid".to_string(),
            ));
        }

        let invitee = self.store.get_user_by_email(&email).await?;
        if let Some(ref invitee) = invitee {
            if self.store.get_member(business, &invitee.id).await?.is_some() {
                return Err(AccountError::AlreadyMember(email));
            }
        }

        let open_invitations = self
            .store
            .list_invitations(business, QueryWindow::default())
            .await?;
        if open_invitations.iter().any(|invitation| {
            invitation.status == InvitationStatus::Pending
                && !invitation.is_expired()
                && invitation.email.eq_ignore_ascii_case(&email)
        }) {
            return Err(AccountError::DuplicateInvitation(email));
        }

        let invitation = TeamInvitation::new(
            business.clone(),
            email,
            role,
            actor.id.clone(),
            self.config.invitation_ttl_secs,
        );
        self.store.create_invitation(invitation.clone()).await?;

        if let Some(invitee) = invitee {
            let business_record = self.store.get_business(business).await?;
            let business_name = business_record
                .map(|b| b.name)
                .unwrap_or_else(|| business.0.clone());
            let notification = Notification::new(
                invitee.id,
                "Team invitation",
                format!("You have been invited to join {business_name}"),
            )
            .with_data(serde_json::json!({
                "invitation_id": invitation.id.0,
                "business_id": business.0,
            }));
            self.store.enqueue_notification(notification).await?;
        }

        self.audit(
            &actor.id.0,
            "member_invited",
            &invitation.id.0,
            true,
            format!("{} as {}", invitation.email, role.as_str()),
            serde_json::json!({ "business_id": business.0, "role": role.as_str() }),
        )
        .await?;

        tracing::info!(
            invitation_id = %invitation.id,
            business_id = %business,
            "team invitation issued"
        );
        Ok(invitation)
    }

    /// Accept an invitation by token and join the team.
    ///
    /// Lapsed invitations are flipped to expired on the spot and refused.
    pub async fn accept_invitation(
        &self,
        actor: &UserAccount,
        token: &str,
    ) -> AccountResult<BusinessMember> {
        let mut invitation = self
            .store
            .get_invitation_by_token(token)
            .await?
            .ok_or_else(|| AccountError::InvitationNotFound(token.to_string()))?;

        if invitation.status != InvitationStatus::Pending {
            return Err(AccountError::InvitationNotPending {
                status: invitation.status.as_str().to_string(),
            });
        }
        if invitation.is_expired() {
            invitation.expire();
            self.store.update_invitation(invitation.clone()).await?;
            self.audit(
                &actor.id.0,
                "invitation_expired",
                &invitation.id.0,
                false,
                invitation.email.clone(),
                serde_json::Value::Null,
            )
            .await?;
            return Err(AccountError::InvitationExpired);
        }
        if !invitation.email.eq_ignore_ascii_case(&actor.email) {
            return Err(AccountError::InvitationEmailMismatch);
        }
        if self
            .store
            .get_member(&invitation.business_id, &actor.id)
            .await?
            .is_some()
        {
            return Err(AccountError::AlreadyMember(actor.email.clone()));
        }

        let member = BusinessMember::new(
            invitation.business_id.clone(),
            actor.id.clone(),
            invitation.role,
        );
        self.store.add_member(member.clone()).await?;

        invitation.accept();
        self.store.update_invitation(invitation.clone()).await?;

        self.audit(
            &actor.id.0,
            "invitation_accepted",
            &invitation.id.0,
            true,
            format!("joined as {}", invitation.role.as_str()),
            serde_json::json!({ "business_id": invitation.business_id.0 }),
        )
        .await?;

        tracing::info!(
            invitation_id = %invitation.id,
            user_id = %actor.id,
            "invitation accepted"
        );
        Ok(member)
    }

    /// Withdraw a pending invitation. Owners and managers only.
    pub async fn revoke_invitation(
        &self,
        actor: &UserAccount,
        id: &InvitationId,
    ) -> AccountResult<TeamInvitation> {
        let mut invitation = self
            .store
            .get_invitation(id)
            .await?
            .ok_or_else(|| AccountError::InvitationNotFound(id.0.clone()))?;

        self.require_manager(&invitation.business_id, &actor.id).await?;

        if invitation.status != InvitationStatus::Pending {
            return Err(AccountError::InvitationNotPending {
                status: invitation.status.as_str().to_string(),
            });
        }

        invitation.revoke();
        self.store.update_invitation(invitation.clone()).await?;

        self.audit(
            &actor.id.0,
            "invitation_revoked",
            &invitation.id.0,
            true,
            invitation.email.clone(),
            serde_json::Value::Null,
        )
        .await?;

        Ok(invitation)
    }

    /// List invitations for a business. Members only.
    pub async fn list_invitations(
        &self,
        actor: &UserAccount,
        business: &BusinessId,
        window: QueryWindow,
    ) -> AccountResult<Vec<TeamInvitation>> {
        self.require_member(business, &actor.id).await?;
        Ok(self.store.list_invitations(business, window).await?)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn require_member(
        &self,
        business: &BusinessId,
        user: &UserId,
    ) -> AccountResult<BusinessMember> {
        if self.store.get_business(business).await?.is_none() {
            return Err(AccountError::BusinessNotFound(business.clone()));
        }
        self.store
            .get_member(business, user)
            .await?
            .ok_or(AccountError::NotAMember)
    }

    async fn require_manager(
        &self,
        business: &BusinessId,
        user: &UserId,
    ) -> AccountResult<BusinessMember> {
        let member = self.require_member(business, user).await?;
        if !member.role.can_manage_team() {
            return Err(AccountError::Forbidden(
                "requires an owner or manager role".to_string(),
            ));
        }
        Ok(member)
    }

    fn validate_new_user(&self, mut request: NewUser) -> AccountResult<NewUser> {
        request.full_name = request.full_name.trim().to_string();
        request.email = normalize_email(&request.email);
        request.phone = request.phone.trim().to_string();
        request.ic_number = request.ic_number.trim().to_string();

        if request.full_name.is_empty() {
            return Err(AccountError::InvalidInput(
                "full name must not be empty".to_string(),
            ));
        }
        if request.email.is_empty() || !request.email.contains('@') {
            return Err(AccountError::InvalidInput(
                "email is not valid".to_string(),
            ));
        }
        if !is_e164(&request.phone) {
            return Err(AccountError::InvalidInput(
                "phone must be in E.164 form, e.g. +60123456789".to_string(),
            ));
        }
        if request.ic_number.is_empty() {
            return Err(AccountError::InvalidInput(
                "IC or passport number must not be empty".to_string(),
            ));
        }
        if request.password.len() < self.config.min_password_len {
            return Err(AccountError::InvalidInput(format!(
                "password must be at least {} characters",
                self.config.min_password_len
            )));
        }
        Ok(request)
    }

    async fn audit(
        &self,
        actor: &str,
        action: &str,
        subject: &str,
        success: bool,
        message: String,
        payload: serde_json::Value,
    ) -> AccountResult<()> {
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

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// `+` followed by 7 to 15 digits
fn is_e164(phone: &str) -> bool {
    let Some(rest) = phone.strip_prefix('+') else {
        return false;
    };
    (7..=15).contains(&rest.len()) && rest.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use onestop_storage::memory::InMemoryStore;

    fn service() -> AccountService<InMemoryStore> {
        AccountService::new(Arc::new(InMemoryStore::new()))
    }

    fn new_user(email: &str, phone: &str) -> NewUser {
        NewUser {
            full_name: "Aisyah Rahman".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            ic_number: "901231105678".to_string(),
            password: "s3cret-password".to_string(),
        }
    }

    async fn verified_user(
        svc: &AccountService<InMemoryStore>,
        email: &str,
        phone: &str,
    ) -> UserAccount {
        let user = svc.register_user(new_user(email, phone)).await.unwrap();
        svc.mark_phone_verified(&user.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_login_requires_verified_phone() {
        let svc = service();
        let user = svc
            .register_user(new_user("aisyah@example.com", "+60123456789"))
            .await
            .unwrap();

        let denied = svc.login("aisyah@example.com", "s3cret-password").await;
        assert!(matches!(denied, Err(AccountError::PhoneUnverified)));

        svc.mark_phone_verified(&user.id).await.unwrap();
        let session = svc
            .login("aisyah@example.com", "s3cret-password")
            .await
            .unwrap();

        let authed = svc.authenticate(&session.token).await.unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let svc = service();
        verified_user(&svc, "aisyah@example.com", "+60123456789").await;

        let result = svc.login("aisyah@example.com", "not-the-password").await;
        assert!(matches!(result, Err(AccountError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_confirm_phone_finds_the_account_by_number() {
        let svc = service();
        let user = svc
            .register_user(new_user("aisyah@example.com", "+60123456789"))
            .await
            .unwrap();

        let confirmed = svc.confirm_phone("+60123456789").await.unwrap();
        assert_eq!(confirmed.as_ref().map(|u| u.id.clone()), Some(user.id));
        assert!(confirmed.is_some_and(|u| u.phone_verified));

        // A number nobody registered is not an error
        let unknown = svc.confirm_phone("+60111111111").await.unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_refused() {
        let svc = service();
        verified_user(&svc, "aisyah@example.com", "+60123456789").await;

        let result = svc
            .register_user(new_user("Aisyah@Example.com", "+60198765432"))
            .await;
        assert!(matches!(result, Err(AccountError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_logout_kills_the_session() {
        let svc = service();
        verified_user(&svc, "aisyah@example.com", "+60123456789").await;
        let session = svc
            .login("aisyah@example.com", "s3cret-password")
            .await
            .unwrap();

        svc.logout(&session.token).await.unwrap();
        let result = svc.authenticate(&session.token).await;
        assert!(matches!(result, Err(AccountError::InvalidSession)));
    }

    #[tokio::test]
    async fn test_register_business_creates_owner_membership() {
        let svc = service();
        let owner = verified_user(&svc, "aisyah@example.com", "+60123456789").await;

        let business = svc
            .register_business(
                &owner,
                NewBusiness {
                    name: "Rahman Trading".to_string(),
                    ssm_number: "202301012345".to_string(),
                },
            )
            .await
            .unwrap();

        let members = svc.list_members(&owner, &business.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, BusinessRole::Owner);

        let businesses = svc.businesses_for(&owner.id).await.unwrap();
        assert_eq!(businesses.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ssm_is_refused() {
        let svc = service();
        let owner = verified_user(&svc, "aisyah@example.com", "+60123456789").await;
        let request = NewBusiness {
            name: "Rahman Trading".to_string(),
            ssm_number: "202301012345".to_string(),
        };
        svc.register_business(&owner, request.clone()).await.unwrap();

        let result = svc.register_business(&owner, request).await;
        assert!(matches!(result, Err(AccountError::DuplicateSsm(_))));
    }

    #[tokio::test]
    async fn test_invite_and_accept_joins_the_team() {
        let svc = service();
        let owner = verified_user(&svc, "aisyah@example.com", "+60123456789").await;
        let invitee = verified_user(&svc, "farid@example.com", "+60198765432").await;
        let business = svc
            .register_business(
                &owner,
                NewBusiness {
                    name: "Rahman Trading".to_string(),
                    ssm_number: "202301012345".to_string(),
                },
            )
            .await
            .unwrap();

        let invitation = svc
            .invite_member(&owner, &business.id, "farid@example.com", BusinessRole::Staff)
            .await
            .unwrap();

        let member = svc
            .accept_invitation(&invitee, &invitation.token)
            .await
            .unwrap();
        assert_eq!(member.role, BusinessRole::Staff);

        let members = svc.list_members(&owner, &business.id).await.unwrap();
        assert_eq!(members.len(), 2);

        let invitations = svc
            .list_invitations(&owner, &business.id, QueryWindow::default())
            .await
            .unwrap();
        assert_eq!(invitations[0].status, InvitationStatus::Accepted);
    }

    #[tokio::test]
    async fn test_staff_member_cannot_invite() {
        let svc = service();
        let owner = verified_user(&svc, "aisyah@example.com", "+60123456789").await;
        let staff = verified_user(&svc, "farid@example.com", "+60198765432").await;
        let business = svc
            .register_business(
                &owner,
                NewBusiness {
                    name: "Rahman Trading".to_string(),
                    ssm_number: "202301012345".to_string(),
                },
            )
            .await
            .unwrap();
        let invitation = svc
            .invite_member(&owner, &business.id, "farid@example.com", BusinessRole::Staff)
            .await
            .unwrap();
        svc.accept_invitation(&staff, &invitation.token)
            .await
            .unwrap();

        let result = svc
            .invite_member(&staff, &business.id, "lina@example.com", BusinessRole::Staff)
            .await;
        assert!(matches!(result, Err(AccountError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_accept_with_wrong_email_is_refused() {
        let svc = service();
        let owner = verified_user(&svc, "aisyah@example.com", "+60123456789").await;
        let outsider = verified_user(&svc, "lina@example.com", "+60171234567").await;
        let business = svc
            .register_business(
                &owner,
                NewBusiness {
                    name: "Rahman Trading".to_string(),
                    ssm_number: "202301012345".to_string(),
                },
            )
            .await
            .unwrap();
        let invitation = svc
            .invite_member(&owner, &business.id, "farid@example.com", BusinessRole::Staff)
            .await
            .unwrap();

        let result = svc.accept_invitation(&outsider, &invitation.token).await;
        assert!(matches!(result, Err(AccountError::InvitationEmailMismatch)));
    }

    #[tokio::test]
    async fn test_expired_invitation_flips_status_and_refuses() {
        let svc = AccountService::with_config(
            Arc::new(InMemoryStore::new()),
            AccountConfig::default().with_invitation_ttl_secs(-1),
        );
        let owner = verified_user(&svc, "aisyah@example.com", "+60123456789").await;
        let invitee = verified_user(&svc, "farid@example.com", "+60198765432").await;
        let business = svc
            .register_business(
                &owner,
                NewBusiness {
                    name: "Rahman Trading".to_string(),
                    ssm_number: "202301012345".to_string(),
                },
            )
            .await
            .unwrap();
        let invitation = svc
            .invite_member(&owner, &business.id, "farid@example.com", BusinessRole::Staff)
            .await
            .unwrap();

        let result = svc.accept_invitation(&invitee, &invitation.token).await;
        assert!(matches!(result, Err(AccountError::InvitationExpired)));

        let invitations = svc
            .list_invitations(&owner, &business.id, QueryWindow::default())
            .await
            .unwrap();
        assert_eq!(invitations[0].status, InvitationStatus::Expired);
    }

    #[tokio::test]
    async fn test_revoked_invitation_cannot_be_accepted() {
        let svc = service();
        let owner = verified_user(&svc, "aisyah@example.com", "+60123456789").await;
        let invitee = verified_user(&svc, "farid@example.com", "+60198765432").await;
        let business = svc
            .register_business(
                &owner,
                NewBusiness {
                    name: "Rahman Trading".to_string(),
                    ssm_number: "202301012345".to_string(),
                },
            )
            .await
            .unwrap();
        let invitation = svc
            .invite_member(&owner, &business.id, "farid@example.com", BusinessRole::Staff)
            .await
            .unwrap();

        svc.revoke_invitation(&owner, &invitation.id).await.unwrap();

        let result = svc.accept_invitation(&invitee, &invitation.token).await;
        assert!(matches!(
            result,
            Err(AccountError::InvitationNotPending { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_pending_invitation_is_refused() {
        let svc = service();
        let owner = verified_user(&svc, "aisyah@example.com", "+60123456789").await;
        let business = svc
            .register_business(
                &owner,
                NewBusiness {
                    name: "Rahman Trading".to_string(),
                    ssm_number: "202301012345".to_string(),
                },
            )
            .await
            .unwrap();
        svc.invite_member(&owner, &business.id, "farid@example.com", BusinessRole::Staff)
            .await
            .unwrap();

        let result = svc
            .invite_member(&owner, &business.id, "Farid@example.com", BusinessRole::Manager)
            .await;
        assert!(matches!(result, Err(AccountError::DuplicateInvitation(_))));
    }

    #[tokio::test]
    async fn test_officer_registration_requires_admin() {
        let svc = service();
        let applicant = verified_user(&svc, "aisyah@example.com", "+60123456789").await;

        let result = svc
            .register_officer(
                &applicant,
                new_user("officer@mbmb.gov.my", "+60131112222"),
                PlatformRole::Officer,
            )
            .await;
        assert!(matches!(result, Err(AccountError::Forbidden(_))));

        let admin = UserAccount::new("Admin", "admin@mbmb.gov.my", "+60130000000", "800101105678")
            .with_role(PlatformRole::Admin);
        let officer = svc
            .register_officer(
                &admin,
                new_user("officer@mbmb.gov.my", "+60131112222"),
                PlatformRole::Officer,
            )
            .await
            .unwrap();
        assert_eq!(officer.role, PlatformRole::Officer);
        assert!(officer.phone_verified);
    }

    #[tokio::test]
    async fn test_invalid_phone_is_refused() {
        let svc = service();
        let result = svc
            .register_user(new_user("aisyah@example.com", "0123456789"))
            .await;
        assert!(matches!(result, Err(AccountError::InvalidInput(_))));
    }
}
