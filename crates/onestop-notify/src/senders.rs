//! Outbound delivery ports and their HTTP implementations.

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;

const SEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OTP_TEMPLATE: &str = "otp_code";

/// A single failed delivery attempt
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SendError(pub String);

// ── Ports ────────────────────────────────────────────────────────────

/// Delivers one push message to one device token.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), SendError>;
}

/// Delivers a one-time code over the WhatsApp template channel.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SendError>;
}

// ── FCM-style Push ───────────────────────────────────────────────────

/// Push sender posting an FCM-style JSON payload with a server key.
pub struct HttpPushSender {
    client: Client,
    endpoint: String,
    server_key: String,
}

impl HttpPushSender {
    pub fn new(
        endpoint: impl Into<String>,
        server_key: impl Into<String>,
    ) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .map_err(|e| SendError(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            server_key: server_key.into(),
        })
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), SendError> {
        let payload = serde_json::json!({
            "to": token,
            "notification": { "title": title, "body": body },
            "data": data,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(SendError(format!("push endpoint returned {status}: {body}")));
        }
        Ok(())
    }
}

// ── WhatsApp OTP ─────────────────────────────────────────────────────

/// OTP sender posting a WhatsApp Business template message.
pub struct HttpOtpSender {
    client: Client,
    endpoint: String,
    access_token: String,
    template: String,
}

impl HttpOtpSender {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .map_err(|e| SendError(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            access_token: access_token.into(),
            template: DEFAULT_OTP_TEMPLATE.to_string(),
        })
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

#[async_trait]
impl OtpSender for HttpOtpSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SendError> {
        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": phone,
            "type": "template",
            "template": {
                "name": self.template,
                "language": { "code": "ms" },
                "components": [{
                    "type": "body",
                    "parameters": [{ "type": "text", "text": code }],
                }],
            },
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(SendError(format!(
                "whatsapp endpoint returned {status}: {body}"
            )));
        }
        Ok(())
    }
}

// ── Test Double ──────────────────────────────────────────────────────

/// One push recorded by [`CaptureSender`]
#[derive(Clone, Debug)]
pub struct CapturedPush {
    pub token: String,
    pub title: String,
    pub body: String,
}

/// In-memory sender implementing both ports; used by tests.
#[derive(Default)]
pub struct CaptureSender {
    pushes: Mutex<Vec<CapturedPush>>,
    codes: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl CaptureSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail.
    pub async fn set_failing(&self, failing: bool) {
        *self.failing.lock().await = failing;
    }

    pub async fn pushes(&self) -> Vec<CapturedPush> {
        self.pushes.lock().await.clone()
    }

    /// The most recent code sent to a phone.
    pub async fn last_code_for(&self, phone: &str) -> Option<String> {
        self.codes
            .lock()
            .await
            .iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, code)| code.clone())
    }

    async fn check_failing(&self) -> Result<(), SendError> {
        if *self.failing.lock().await {
            return Err(SendError("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PushSender for CaptureSender {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        _data: &serde_json::Value,
    ) -> Result<(), SendError> {
        self.check_failing().await?;
        self.pushes.lock().await.push(CapturedPush {
            token: token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl OtpSender for CaptureSender {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), SendError> {
        self.check_failing().await?;
        self.codes
            .lock()
            .await
            .push((phone.to_string(), code.to_string()));
        Ok(())
    }
}
