//! reqwest implementation of the MBMB port.

use crate::api::{MbmbApi, OutstandingBill, PaymentReceipt, PaymentSession};
use crate::error::{MbmbError, MbmbResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;

/// Refresh the cached token this long before its expiry
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_MAX_CHARS: usize = 320;

// ── Configuration ────────────────────────────────────────────────────

/// Connection settings for the council API
#[derive(Clone, Debug)]
pub struct MbmbConfig {
    /// Base URL of the MBMB API, no trailing slash
    pub base_url: String,
    /// Client credential identifier
    pub client_id: String,
    /// Client credential secret
    pub client_secret: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl MbmbConfig {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

// ── Wire Structs ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Debug, Serialize)]
struct CreatePaymentRequest<'a> {
    order_id: &'a str,
    amount_sen: i64,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct BillsResponse {
    bills: Vec<OutstandingBill>,
}

#[derive(Debug, Deserialize)]
struct ReceiptRow {
    reference: String,
    status: String,
    receipt_no: Option<String>,
    paid_at: Option<DateTime<Utc>>,
}

struct CachedToken {
    bearer: String,
    expires_at: DateTime<Utc>,
}

// ── Client ───────────────────────────────────────────────────────────

/// HTTP client for the MBMB council API.
///
/// Holds one bearer token behind a mutex; the lock is held across a
/// refresh so concurrent callers wait on a single credential exchange
/// instead of racing their own.
pub struct MbmbHttpClient {
    config: MbmbConfig,
    client: Client,
    token: Mutex<Option<CachedToken>>,
}

impl MbmbHttpClient {
    pub fn new(config: MbmbConfig) -> MbmbResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            token: Mutex::new(None),
        })
    }

    /// Return a valid bearer token, exchanging credentials when the
    /// cached one is missing or within the refresh margin.
    async fn bearer(&self) -> MbmbResult<String> {
        let mut cached = self.token.lock().await;
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if let Some(token) = cached.as_ref() {
            if token.expires_at - margin > Utc::now() {
                return Ok(token.bearer.clone());
            }
        }

        let url = format!("{}/api/v1/auth/token", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
            }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MbmbError::Auth(format!(
                "{status}: {}",
                truncate(&body, ERROR_BODY_MAX_CHARS)
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MbmbError::Decode(e.to_string()))?;

        tracing::debug!(expires_in = token.expires_in, "MBMB bearer token refreshed");
        let bearer = token.access_token.clone();
        *cached = Some(CachedToken {
            bearer: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        Ok(bearer)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> MbmbResult<T> {
        let bearer = self.bearer().await?;
        let url = format!("{}{}", self.config.base_url, path);
        let response = self.client.get(&url).bearer_auth(bearer).send().await?;
        handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> MbmbResult<T> {
        let bearer = self.bearer().await?;
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await?;
        handle_response(response).await
    }
}

#[async_trait]
impl MbmbApi for MbmbHttpClient {
    async fn authenticate(&self) -> MbmbResult<String> {
        self.bearer().await
    }

    async fn lookup_bills(&self, payer_id: &str) -> MbmbResult<Vec<OutstandingBill>> {
        let response: BillsResponse = self
            .get(&format!("/api/v1/billing/outstanding?payer_id={payer_id}"))
            .await?;
        Ok(response.bills)
    }

    async fn create_payment(
        &self,
        order_id: &str,
        amount_sen: i64,
        description: &str,
    ) -> MbmbResult<PaymentSession> {
        let session: PaymentSession = self
            .post(
                "/api/v1/payments",
                &CreatePaymentRequest {
                    order_id,
                    amount_sen,
                    description,
                },
            )
            .await?;
        tracing::info!(order_id, reference = %session.reference, "MBMB payment session opened");
        Ok(session)
    }

    async fn fetch_receipt(&self, reference: &str) -> MbmbResult<PaymentReceipt> {
        let row: ReceiptRow = self.get(&format!("/api/v1/payments/{reference}")).await?;
        Ok(PaymentReceipt {
            reference: row.reference,
            paid: row.status.eq_ignore_ascii_case("paid"),
            receipt_no: row.receipt_no,
            paid_at: row.paid_at,
        })
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> MbmbResult<T> {
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| MbmbError::Decode(e.to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiMessage>(&body)
            .map(|m| m.message)
            .unwrap_or_else(|_| truncate(&body, ERROR_BODY_MAX_CHARS));
        Err(MbmbError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}
