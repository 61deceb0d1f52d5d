//! The MBMB port: trait, wire types, and the test double.

use crate::error::{MbmbError, MbmbResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::Mutex;

// ── Wire Types ───────────────────────────────────────────────────────

/// One outstanding municipal bill (assessment tax, compound, licence)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutstandingBill {
    /// Council bill number
    pub bill_no: String,
    /// Human-readable description of the charge
    pub description: String,
    /// Amount due in sen
    pub amount_sen: i64,
    /// Payment deadline, when the council publishes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// An open payment session at the council gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentSession {
    /// MBMB payment reference; the callback is keyed to this
    pub reference: String,
    /// Hosted checkout page for the payer
    pub checkout_url: String,
}

/// Settlement state of a payment session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// MBMB payment reference
    pub reference: String,
    /// Whether the council confirms the payment as settled
    pub paid: bool,
    /// Council receipt number, present once paid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_no: Option<String>,
    /// Settlement time, present once paid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

// ── Port ─────────────────────────────────────────────────────────────

/// Async interface to the MBMB council API.
///
/// Services depend on this trait; the HTTP implementation lives in
/// [`crate::MbmbHttpClient`] and tests use [`StaticMbmb`].
#[async_trait]
pub trait MbmbApi: Send + Sync {
    /// Exchange client credentials for a bearer token.
    async fn authenticate(&self) -> MbmbResult<String>;

    /// Outstanding bills for an IC or business registration number.
    async fn lookup_bills(&self, payer_id: &str) -> MbmbResult<Vec<OutstandingBill>>;

    /// Open a payment session for one order.
    async fn create_payment(
        &self,
        order_id: &str,
        amount_sen: i64,
        description: &str,
    ) -> MbmbResult<PaymentSession>;

    /// Settlement state and receipt for a session.
    async fn fetch_receipt(&self, reference: &str) -> MbmbResult<PaymentReceipt>;
}

// ── Test Double ──────────────────────────────────────────────────────

/// Deterministic in-memory MBMB double.
///
/// References follow `MBMB-<order_id>` so tests can predict them.
/// An injected failure message makes every call return
/// [`MbmbError::Api`] with status 503, which is how tests exercise
/// upstream-outage paths.
pub struct StaticMbmb {
    bills: Vec<OutstandingBill>,
    paid: Mutex<HashSet<String>>,
    outage: Mutex<Option<String>>,
}

impl StaticMbmb {
    pub fn new() -> Self {
        Self {
            bills: Vec::new(),
            paid: Mutex::new(HashSet::new()),
            outage: Mutex::new(None),
        }
    }

    pub fn with_bills(mut self, bills: Vec<OutstandingBill>) -> Self {
        self.bills = bills;
        self
    }

    /// Mark a reference as settled so `fetch_receipt` reports it paid.
    pub async fn settle(&self, reference: &str) {
        self.paid.lock().await.insert(reference.to_string());
    }

    /// Make every subsequent call fail with the given upstream message.
    pub async fn break_with(&self, message: &str) {
        *self.outage.lock().await = Some(message.to_string());
    }

    async fn check_outage(&self) -> MbmbResult<()> {
        if let Some(message) = self.outage.lock().await.clone() {
            return Err(MbmbError::Api {
                status: 503,
                message,
            });
        }
        Ok(())
    }
}

impl Default for StaticMbmb {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MbmbApi for StaticMbmb {
    async fn authenticate(&self) -> MbmbResult<String> {
        self.check_outage().await?;
        Ok("static-token".to_string())
    }

    async fn lookup_bills(&self, _payer_id: &str) -> MbmbResult<Vec<OutstandingBill>> {
        self.check_outage().await?;
        Ok(self.bills.clone())
    }

    async fn create_payment(
        &self,
        order_id: &str,
        _amount_sen: i64,
        _description: &str,
    ) -> MbmbResult<PaymentSession> {
        self.check_outage().await?;
        let reference = format!("MBMB-{order_id}");
        Ok(PaymentSession {
            checkout_url: format!("https://pay.mbmb.test/{reference}"),
            reference,
        })
    }

    async fn fetch_receipt(&self, reference: &str) -> MbmbResult<PaymentReceipt> {
        self.check_outage().await?;
        let paid = self.paid.lock().await.contains(reference);
        Ok(PaymentReceipt {
            reference: reference.to_string(),
            paid,
            receipt_no: paid.then(|| format!("RCT-{reference}")),
            paid_at: paid.then(Utc::now),
        })
    }
}
