//! Payment gate port.
//!
//! Completing the final review stage requires the processing fee to be
//! settled. The review machine asks through this port and stays unaware of
//! invoices, references and payment rails.

use async_trait::async_trait;
use onestop_types::ProjectId;
use thiserror::Error;

/// Errors surfaced by a payment gate implementation
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Payment gate unavailable: {0}")]
    Unavailable(String),
}

/// Reports whether a project's processing fee is settled
#[async_trait]
pub trait PaymentGate: Send + Sync {
    async fn processing_fee_paid(&self, project: &ProjectId) -> Result<bool, GateError>;
}
