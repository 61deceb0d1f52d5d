//! Notifications: device tokens, the queued outbox, and OTP challenges.

use crate::account::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Notification Identifier ──────────────────────────────────────────

/// Unique identifier for a queued notification
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Device Platform ──────────────────────────────────────────────────

/// Platform of a registered push device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePlatform {
    Android,
    Ios,
    Web,
}

impl DevicePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Web => "web",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "android" => Some(Self::Android),
            "ios" => Some(Self::Ios),
            "web" => Some(Self::Web),
            _ => None,
        }
    }
}

// ── Device Token ─────────────────────────────────────────────────────

/// A push token registered by one of a user's devices
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceToken {
    pub user_id: UserId,
    /// Opaque push token issued by the platform's push service
    pub token: String,
    pub platform: DevicePlatform,
    pub registered_at: DateTime<Utc>,
}

impl DeviceToken {
    pub fn new(user_id: UserId, token: impl Into<String>, platform: DevicePlatform) -> Self {
        Self {
            user_id,
            token: token.into(),
            platform,
            registered_at: Utc::now(),
        }
    }
}

// ── Notification Status ──────────────────────────────────────────────

/// Delivery state of a queued notification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Waiting for the dispatcher
    #[default]
    Queued,
    /// Delivered to at least one device
    Sent,
    /// Given up after repeated delivery failures
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "queued" => Some(Self::Queued),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

// ── Notification ─────────────────────────────────────────────────────

/// One message queued for push delivery
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier
    pub id: NotificationId,
    /// The recipient account
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    /// Structured payload delivered alongside the message
    pub data: serde_json::Value,
    /// Delivery state
    pub status: NotificationStatus,
    /// Delivery attempts so far
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    /// When delivery succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(user_id: UserId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id,
            title: title.into(),
            body: body.into(),
            data: serde_json::Value::Null,
            status: NotificationStatus::Queued,
            attempts: 0,
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Record a successful delivery
    pub fn mark_sent(&mut self) {
        self.status = NotificationStatus::Sent;
        self.sent_at = Some(Utc::now());
    }

    /// Record a failed attempt; the caller decides when to give up
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Give up on delivery
    pub fn mark_failed(&mut self) {
        self.status = NotificationStatus::Failed;
    }
}

// ── OTP Challenge ────────────────────────────────────────────────────

/// An outstanding one-time-password challenge for a phone number.
/// Only the BLAKE3 digest of the code is stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// Phone number in E.164 form
    pub phone: String,
    /// Hex-encoded BLAKE3 digest of code plus phone
    pub code_hash: String,
    /// Failed verification attempts so far
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn new(phone: impl Into<String>, code_hash: impl Into<String>, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            phone: phone.into(),
            code_hash: code_hash.into(),
            attempts: 0,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_delivery_lifecycle() {
        let mut note = Notification::new(UserId::new("user-1"), "Document verified", "Your site plan was accepted")
            .with_data(serde_json::json!({"document_id": "doc-1"}));
        assert_eq!(note.status, NotificationStatus::Queued);
        assert_eq!(note.attempts, 0);

        note.record_attempt();
        note.record_attempt();
        assert_eq!(note.attempts, 2);

        note.mark_sent();
        assert_eq!(note.status, NotificationStatus::Sent);
        assert!(note.sent_at.is_some());
    }

    #[test]
    fn test_notification_gives_up() {
        let mut note = Notification::new(UserId::new("user-1"), "t", "b");
        note.record_attempt();
        note.mark_failed();
        assert_eq!(note.status, NotificationStatus::Failed);
        assert!(note.sent_at.is_none());
    }

    #[test]
    fn test_challenge_expiry() {
        let live = OtpChallenge::new("+60123456789", "ab".repeat(32), 300);
        assert!(!live.is_expired());

        let dead = OtpChallenge::new("+60123456789", "ab".repeat(32), -1);
        assert!(dead.is_expired());
    }

    #[test]
    fn test_platform_round_trip() {
        for platform in [DevicePlatform::Android, DevicePlatform::Ios, DevicePlatform::Web] {
            assert_eq!(DevicePlatform::parse(platform.as_str()), Some(platform));
        }
        assert_eq!(DevicePlatform::parse("symbian"), None);
    }
}
