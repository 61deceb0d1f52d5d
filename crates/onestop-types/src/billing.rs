//! Billing: invoices for municipal fees, settled through the MBMB API.
//!
//! Amounts are carried in sen (minor units). An invoice gains an MBMB
//! payment reference when a gateway session is opened and a receipt
//! number once the council confirms payment.

use crate::project::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Invoice Identifier ───────────────────────────────────────────────

/// Unique identifier for an invoice
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

impl InvoiceId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Invoice Kind ─────────────────────────────────────────────────────

/// Which municipal fee an invoice charges
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    /// Charged on submission, gates the final review stage
    ProcessingFee,
    /// Charged after review completes, gates the permit grant
    PermitFee,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessingFee => "processing_fee",
            Self::PermitFee => "permit_fee",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "processing_fee" => Some(Self::ProcessingFee),
            "permit_fee" => Some(Self::PermitFee),
            _ => None,
        }
    }
}

// ── Invoice Status ───────────────────────────────────────────────────

/// Settlement state of an invoice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Issued, no payment session opened yet
    #[default]
    Unpaid,
    /// An MBMB payment session is open
    PaymentPending,
    /// Confirmed settled by the council
    Paid,
    /// Withdrawn; can never be paid
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::PaymentPending => "payment_pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unpaid" => Some(Self::Unpaid),
            "payment_pending" => Some(Self::PaymentPending),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

// ── Invoice ──────────────────────────────────────────────────────────

/// One fee charged against a permit application
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique invoice identifier
    pub id: InvoiceId,
    /// The application the fee belongs to
    pub project_id: ProjectId,
    /// Which fee this invoice charges
    pub kind: InvoiceKind,
    /// Amount due in sen
    pub amount_sen: i64,
    /// ISO currency code
    pub currency: String,
    /// Settlement state
    pub status: InvoiceStatus,
    /// MBMB payment reference, set when a session is opened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbmb_reference: Option<String>,
    /// Council receipt number, set on confirmation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_no: Option<String>,
    /// When the invoice was issued
    pub created_at: DateTime<Utc>,
    /// When the invoice was last updated
    pub updated_at: DateTime<Utc>,
    /// When the council confirmed payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn new(project_id: ProjectId, kind: InvoiceKind, amount_sen: i64) -> Self {
        let now = Utc::now();
        Self {
            id: InvoiceId::generate(),
            project_id,
            kind,
            amount_sen,
            currency: "MYR".to_string(),
            status: InvoiceStatus::Unpaid,
            mbmb_reference: None,
            receipt_no: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    /// Record the open MBMB session
    pub fn mark_payment_pending(&mut self, reference: impl Into<String>) {
        self.status = InvoiceStatus::PaymentPending;
        self.mbmb_reference = Some(reference.into());
        self.updated_at = Utc::now();
    }

    /// Record the council confirmation
    pub fn mark_paid(&mut self, receipt_no: impl Into<String>, paid_at: DateTime<Utc>) {
        self.status = InvoiceStatus::Paid;
        self.receipt_no = Some(receipt_no.into());
        self.paid_at = Some(paid_at);
        self.updated_at = Utc::now();
    }

    /// Withdraw the invoice
    pub fn cancel(&mut self) {
        self.status = InvoiceStatus::Cancelled;
        self.updated_at = Utc::now();
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_invoice_is_unpaid_myr() {
        let invoice = Invoice::new(ProjectId::new("proj-1"), InvoiceKind::ProcessingFee, 15_000);
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
        assert_eq!(invoice.currency, "MYR");
        assert_eq!(invoice.amount_sen, 15_000);
        assert!(!invoice.is_paid());
    }

    #[test]
    fn test_payment_flow_stamps_reference_and_receipt() {
        let mut invoice = Invoice::new(ProjectId::new("proj-1"), InvoiceKind::PermitFee, 250_000);

        invoice.mark_payment_pending("MBMB-REF-001");
        assert_eq!(invoice.status, InvoiceStatus::PaymentPending);
        assert_eq!(invoice.mbmb_reference.as_deref(), Some("MBMB-REF-001"));

        let paid_at = Utc::now();
        invoice.mark_paid("RCT-2024-778", paid_at);
        assert!(invoice.is_paid());
        assert_eq!(invoice.receipt_no.as_deref(), Some("RCT-2024-778"));
        assert_eq!(invoice.paid_at, Some(paid_at));
        assert!(invoice.status.is_terminal());
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut invoice = Invoice::new(ProjectId::new("proj-1"), InvoiceKind::ProcessingFee, 15_000);
        invoice.cancel();
        assert_eq!(invoice.status, InvoiceStatus::Cancelled);
        assert!(invoice.status.is_terminal());
    }

    #[test]
    fn test_kind_and_status_round_trip() {
        for kind in [InvoiceKind::ProcessingFee, InvoiceKind::PermitFee] {
            assert_eq!(InvoiceKind::parse(kind.as_str()), Some(kind));
        }
        for status in [
            InvoiceStatus::Unpaid,
            InvoiceStatus::PaymentPending,
            InvoiceStatus::Paid,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(InvoiceStatus::parse(status.as_str()), Some(status));
        }
    }
}
