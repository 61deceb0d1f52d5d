//! Accounts: platform users, businesses, memberships, and team invitations.
//!
//! A UserAccount is the authenticated principal. Businesses group accounts
//! through BusinessMember records, and TeamInvitations carry the opaque
//! tokens through which new members join.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── User Identifier ──────────────────────────────────────────────────

/// Unique identifier for a platform user
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Business Identifier ──────────────────────────────────────────────

/// Unique identifier for a registered business
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusinessId(pub String);

impl BusinessId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for BusinessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Invitation Identifier ────────────────────────────────────────────

/// Unique identifier for a team invitation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvitationId(pub String);

impl InvitationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for InvitationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Platform Role ────────────────────────────────────────────────────

/// Platform-wide role of a user account
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlatformRole {
    /// Citizen or business user submitting applications
    #[default]
    Applicant,
    /// Council officer reviewing applications and documents
    Officer,
    /// Administrator managing stage configuration and officer accounts
    Admin,
}

impl PlatformRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Officer => "officer",
            Self::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "applicant" => Some(Self::Applicant),
            "officer" => Some(Self::Officer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Officers and admins may decide reviews and documents
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Officer | Self::Admin)
    }
}

// ── User Account ─────────────────────────────────────────────────────

/// A registered platform user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique account identifier
    pub id: UserId,
    /// Full legal name
    pub full_name: String,
    /// Login email, unique across the platform
    pub email: String,
    /// Phone number in E.164 form, unique across the platform
    pub phone: String,
    /// IC or passport number
    pub ic_number: String,
    /// Platform-wide role
    pub role: PlatformRole,
    /// Whether the phone passed OTP verification
    pub phone_verified: bool,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Create a new applicant account (phone unverified until OTP passes)
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        ic_number: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::generate(),
            full_name: full_name.into(),
            email: email.into(),
            phone: phone.into(),
            ic_number: ic_number.into(),
            role: PlatformRole::Applicant,
            phone_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role: PlatformRole) -> Self {
        self.role = role;
        self
    }

    /// Mark the phone as OTP-verified
    pub fn verify_phone(&mut self) {
        self.phone_verified = true;
        self.updated_at = Utc::now();
    }
}

// ── Credential ───────────────────────────────────────────────────────

/// Salted password digest for one account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: UserId,
    /// Hex-encoded random salt
    pub salt: String,
    /// Hex-encoded BLAKE3 digest of salt plus password
    pub digest: String,
    pub updated_at: DateTime<Utc>,
}

// ── Session ──────────────────────────────────────────────────────────

/// An authenticated session identified by an opaque bearer token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// ── Business ─────────────────────────────────────────────────────────

/// A business registered on the platform
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Business {
    /// Unique business identifier
    pub id: BusinessId,
    /// Registered business name
    pub name: String,
    /// SSM registration number, unique across the platform
    pub ssm_number: String,
    /// The account that registered the business
    pub owner: UserId,
    /// When the business was registered
    pub created_at: DateTime<Utc>,
}

impl Business {
    pub fn new(name: impl Into<String>, ssm_number: impl Into<String>, owner: UserId) -> Self {
        Self {
            id: BusinessId::generate(),
            name: name.into(),
            ssm_number: ssm_number.into(),
            owner,
            created_at: Utc::now(),
        }
    }
}

// ── Business Role ────────────────────────────────────────────────────

/// Role of a member within one business
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusinessRole {
    /// Full control, assigned to the registering account
    Owner,
    /// May manage the team and submit applications
    Manager,
    /// May view and prepare applications
    #[default]
    Staff,
}

impl BusinessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Manager => "manager",
            Self::Staff => "staff",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "owner" => Some(Self::Owner),
            "manager" => Some(Self::Manager),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }

    /// Whether this role may invite and revoke team members
    pub fn can_manage_team(&self) -> bool {
        matches!(self, Self::Owner | Self::Manager)
    }
}

// ── Business Member ──────────────────────────────────────────────────

/// Membership of one user in one business
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BusinessMember {
    pub business_id: BusinessId,
    pub user_id: UserId,
    pub role: BusinessRole,
    pub joined_at: DateTime<Utc>,
}

impl BusinessMember {
    pub fn new(business_id: BusinessId, user_id: UserId, role: BusinessRole) -> Self {
        Self {
            business_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

// ── Invitation Status ────────────────────────────────────────────────

/// Lifecycle state of a team invitation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    /// Issued, waiting for the invitee
    #[default]
    Pending,
    /// Accepted and converted into a membership
    Accepted,
    /// Withdrawn by a team manager before acceptance
    Revoked,
    /// Lapsed past its expiry
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "revoked" => Some(Self::Revoked),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Revoked | Self::Expired)
    }
}

// ── Team Invitation ──────────────────────────────────────────────────

/// An invitation for an email address to join a business team
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeamInvitation {
    /// Unique invitation identifier
    pub id: InvitationId,
    /// The business the invitee would join
    pub business_id: BusinessId,
    /// Invitee email address
    pub email: String,
    /// Role the invitee would receive on acceptance
    pub role: BusinessRole,
    /// Opaque acceptance token
    pub token: String,
    /// Current lifecycle state
    pub status: InvitationStatus,
    /// The member who issued the invitation
    pub invited_by: UserId,
    /// When the invitation was issued
    pub created_at: DateTime<Utc>,
    /// When the invitation lapses
    pub expires_at: DateTime<Utc>,
}

impl TeamInvitation {
    pub fn new(
        business_id: BusinessId,
        email: impl Into<String>,
        role: BusinessRole,
        invited_by: UserId,
        ttl_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InvitationId::generate(),
            business_id,
            email: email.into(),
            role,
            token: uuid::Uuid::new_v4().to_string(),
            status: InvitationStatus::Pending,
            invited_by,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Convert to accepted
    pub fn accept(&mut self) {
        self.status = InvitationStatus::Accepted;
    }

    /// Withdraw before acceptance
    pub fn revoke(&mut self) {
        self.status = InvitationStatus::Revoked;
    }

    /// Mark as lapsed
    pub fn expire(&mut self) {
        self.status = InvitationStatus::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_is_unverified_applicant() {
        let account = UserAccount::new("Aisyah Rahman", "aisyah@example.com", "+60123456789", "901231105678");
        assert_eq!(account.role, PlatformRole::Applicant);
        assert!(!account.phone_verified);
    }

    #[test]
    fn test_verify_phone_flips_flag() {
        let mut account = UserAccount::new("Aisyah Rahman", "aisyah@example.com", "+60123456789", "901231105678");
        account.verify_phone();
        assert!(account.phone_verified);
    }

    #[test]
    fn test_role_string_round_trip() {
        for role in [PlatformRole::Applicant, PlatformRole::Officer, PlatformRole::Admin] {
            assert_eq!(PlatformRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(PlatformRole::parse("unknown"), None);
        assert!(PlatformRole::Officer.is_staff());
        assert!(!PlatformRole::Applicant.is_staff());
    }

    #[test]
    fn test_business_role_permissions() {
        assert!(BusinessRole::Owner.can_manage_team());
        assert!(BusinessRole::Manager.can_manage_team());
        assert!(!BusinessRole::Staff.can_manage_team());
    }

    #[test]
    fn test_session_expiry() {
        let live = Session::new(UserId::new("user-1"), 3600);
        assert!(!live.is_expired());

        let dead = Session::new(UserId::new("user-1"), -1);
        assert!(dead.is_expired());
    }

    #[test]
    fn test_invitation_lifecycle() {
        let mut invitation = TeamInvitation::new(
            BusinessId::new("biz-1"),
            "staff@example.com",
            BusinessRole::Staff,
            UserId::new("owner-1"),
            86_400,
        );
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert!(!invitation.is_expired());
        assert!(!invitation.status.is_terminal());

        invitation.accept();
        assert_eq!(invitation.status, InvitationStatus::Accepted);
        assert!(invitation.status.is_terminal());
    }

    #[test]
    fn test_invitation_expiry_window() {
        let invitation = TeamInvitation::new(
            BusinessId::new("biz-1"),
            "staff@example.com",
            BusinessRole::Staff,
            UserId::new("owner-1"),
            -1,
        );
        assert!(invitation.is_expired());
    }

    #[test]
    fn test_invitation_status_round_trip() {
        for status in [
            InvitationStatus::Pending,
            InvitationStatus::Accepted,
            InvitationStatus::Revoked,
            InvitationStatus::Expired,
        ] {
            assert_eq!(InvitationStatus::parse(status.as_str()), Some(status));
        }
    }
}
