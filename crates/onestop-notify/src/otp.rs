//! WhatsApp OTP challenges for phone verification.
//!
//! Storage only ever sees `BLAKE3(code || phone)`; the plaintext code
//! travels to the sender port and is never logged.

use crate::error::{NotifyError, NotifyResult};
use crate::senders::OtpSender;
use chrono::{Duration, Utc};
use onestop_storage::{AuditAppend, PlatformStore};
use onestop_types::OtpChallenge;
use rand::Rng;
use std::sync::Arc;

/// OTP issuance and verification policy
#[derive(Clone, Copy, Debug)]
pub struct OtpConfig {
    /// Challenge lifetime in seconds
    pub ttl_secs: i64,
    /// Wrong codes tolerated before the challenge is consumed
    pub max_attempts: u32,
    /// Minimum seconds between two codes for the same phone
    pub resend_cooldown_secs: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 5 * 60,
            max_attempts: 5,
            resend_cooldown_secs: 60,
        }
    }
}

impl OtpConfig {
    pub fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_resend_cooldown_secs(mut self, secs: i64) -> Self {
        self.resend_cooldown_secs = secs;
        self
    }
}

/// OTP service over a platform store and the WhatsApp sender port
pub struct OtpService<S: ?Sized, O: ?Sized> {
    store: Arc<S>,
    sender: Arc<O>,
    config: OtpConfig,
}

impl<S: PlatformStore + ?Sized, O: OtpSender + ?Sized> OtpService<S, O> {
    pub fn new(store: Arc<S>, sender: Arc<O>) -> Self {
        Self {
            store,
            sender,
            config: OtpConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OtpConfig) -> Self {
        self.config = config;
        self
    }

    /// Issue a fresh challenge and send the code over WhatsApp.
    ///
    /// A live challenge younger than the cooldown refuses the resend.
    /// Issuing replaces any previous challenge for the phone.
    pub async fn request_otp(&self, phone: &str) -> NotifyResult<()> {
        let phone = phone.trim();
        if !is_e164(phone) {
            return Err(NotifyError::InvalidInput(
                "phone must be in E.164 format".to_string(),
            ));
        }

        if let Some(existing) = self.store.get_otp_challenge(phone).await? {
            let elapsed = Utc::now() - existing.created_at;
            let cooldown = Duration::seconds(self.config.resend_cooldown_secs);
            if !existing.is_expired() && elapsed < cooldown {
                return Err(NotifyError::CooldownActive {
                    retry_in_secs: (cooldown - elapsed).num_seconds().max(1),
                });
            }
        }

        let code = generate_code();
        let challenge = OtpChallenge::new(phone, hash_code(phone, &code), self.config.ttl_secs);
        self.store.upsert_otp_challenge(challenge).await?;
        self.sender.send_code(phone, &code).await?;

        self.audit(phone, "otp_requested", true).await?;
        tracing::info!(phone, "OTP challenge issued");
        Ok(())
    }

    /// Check a submitted code against the live challenge.
    ///
    /// A correct code consumes the challenge. Wrong codes count against
    /// `max_attempts`; reaching it consumes the challenge too, so a
    /// brute-force run has to restart through the cooldown.
    pub async fn verify_otp(&self, phone: &str, code: &str) -> NotifyResult<()> {
        let phone = phone.trim();
        let Some(mut challenge) = self.store.get_otp_challenge(phone).await? else {
            return Err(NotifyError::Expired);
        };
        if challenge.is_expired() {
            self.store.delete_otp_challenge(phone).await?;
            return Err(NotifyError::Expired);
        }

        if !code_matches(&challenge.code_hash, phone, code.trim()) {
            challenge.attempts += 1;
            if challenge.attempts >= self.config.max_attempts {
                self.store.delete_otp_challenge(phone).await?;
                self.audit(phone, "otp_locked", false).await?;
                tracing::warn!(phone, "OTP challenge consumed by repeated failures");
                return Err(NotifyError::TooManyAttempts);
            }
            self.store.upsert_otp_challenge(challenge).await?;
            return Err(NotifyError::InvalidCode);
        }

        self.store.delete_otp_challenge(phone).await?;
        self.audit(phone, "otp_verified", true).await?;
        tracing::info!(phone, "phone verified by OTP");
        Ok(())
    }

    async fn audit(&self, phone: &str, action: &str, success: bool) -> NotifyResult<()> {
        self.store
            .append_audit(AuditAppend {
                timestamp: Utc::now(),
                actor: phone.to_string(),
                action: action.to_string(),
                subject: phone.to_string(),
                success,
                message: String::new(),
                payload: serde_json::Value::Null,
            })
            .await?;
        Ok(())
    }
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn hash_code(phone: &str, code: &str) -> String {
    blake3::Hasher::new()
        .update(code.as_bytes())
        .update(phone.as_bytes())
        .finalize()
        .to_hex()
        .to_string()
}

/// Compare as parsed hashes so the equality check is constant-time.
fn code_matches(stored_hex: &str, phone: &str, code: &str) -> bool {
    let Ok(stored) = blake3::Hash::from_hex(stored_hex) else {
        return false;
    };
    let computed = blake3::Hasher::new()
        .update(code.as_bytes())
        .update(phone.as_bytes())
        .finalize();
    stored == computed
}

fn is_e164(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix('+') else {
        return false;
    };
    (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}
