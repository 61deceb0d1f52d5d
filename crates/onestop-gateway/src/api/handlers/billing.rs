//! Invoice and payment handlers
//!
//! The council calls `payment_callback` after a checkout completes; the
//! endpoint is authenticated by the shared callback token, not a user
//! session. A confirmed permit fee also advances the project out of
//! `PendingPermitPayment`, and a replayed callback must stay idempotent,
//! so the stale-state error from that advancement is swallowed here.

use crate::api::extract::CurrentUser;
use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use onestop_mbmb::{OutstandingBill, PaymentSession};
use onestop_review::ReviewError;
use onestop_types::{Invoice, InvoiceId, InvoiceKind, InvoiceStatus, ProjectId};
use serde::{Deserialize, Serialize};

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// Fetch one invoice
pub async fn get_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    let invoice = state.billing.get_invoice(&user, &InvoiceId::new(id)).await?;
    Ok(Json(invoice))
}

/// Invoices of a project
pub async fn list_project_invoices(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let invoices = state
        .billing
        .list_invoices(&user, &ProjectId::new(id))
        .await?;
    Ok(Json(invoices))
}

/// Open a hosted checkout session for an unpaid invoice
pub async fn pay_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<PaymentSession>> {
    let session = state
        .billing
        .initiate_payment(&user, &InvoiceId::new(id))
        .await?;
    Ok(Json(session))
}

/// Council payment callback body
#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub reference: String,
    pub status: String,
    pub receipt_no: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Callback outcome
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub processed: bool,
    pub invoice: Option<Invoice>,
}

/// Apply a payment confirmation from MBMB.
pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CallbackRequest>,
) -> ApiResult<Json<CallbackResponse>> {
    let provided = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided != Some(state.callback_token.as_str()) {
        return Err(ApiError::Unauthorized("invalid callback token".to_string()));
    }

    if !request.status.eq_ignore_ascii_case("paid") {
        tracing::info!(
            reference = %request.reference,
            status = %request.status,
            "ignoring non-paid payment callback"
        );
        return Ok(Json(CallbackResponse {
            processed: false,
            invoice: None,
        }));
    }

    let receipt_no = request
        .receipt_no
        .as_deref()
        .unwrap_or(request.reference.as_str());
    let paid_at = request.paid_at.unwrap_or_else(Utc::now);
    let invoice = state
        .billing
        .confirm_payment(&request.reference, receipt_no, paid_at)
        .await?;

    advance_on_permit_payment(&state, &invoice).await?;

    Ok(Json(CallbackResponse {
        processed: true,
        invoice: Some(invoice),
    }))
}

/// Re-check a pending payment against MBMB when the callback went missing
pub async fn reconcile_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    let id = InvoiceId::new(id);
    // Visibility check runs first so reconciliation cannot probe foreign
    // invoices.
    state.billing.get_invoice(&user, &id).await?;
    let invoice = state.billing.reconcile_payment(&id).await?;
    advance_on_permit_payment(&state, &invoice).await?;
    Ok(Json(invoice))
}

/// Cancel an unpaid invoice. Admins only.
pub async fn cancel_invoice(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    let invoice = state
        .billing
        .cancel_invoice(&user, &InvoiceId::new(id))
        .await?;
    Ok(Json(invoice))
}

/// Outstanding-bill lookup parameters
#[derive(Debug, Deserialize)]
pub struct OutstandingParams {
    pub payer: String,
}

/// Outstanding council bills for a payer, straight from MBMB
pub async fn outstanding_bills(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(params): Query<OutstandingParams>,
) -> ApiResult<Json<Vec<OutstandingBill>>> {
    let bills = state.billing.outstanding_bills(&params.payer).await?;
    Ok(Json(bills))
}

/// A settled permit fee releases the project. A replayed confirmation
/// finds the project already moved on, which is not an error here.
async fn advance_on_permit_payment(state: &AppState, invoice: &Invoice) -> Result<(), ApiError> {
    if invoice.kind != InvoiceKind::PermitFee || invoice.status != InvoiceStatus::Paid {
        return Ok(());
    }
    match state.review.complete_permit_payment(&invoice.project_id).await {
        Ok(project) => {
            tracing::info!(
                project_id = %project.id,
                invoice_id = %invoice.id,
                "permit fee settled, project approved"
            );
            Ok(())
        }
        Err(ReviewError::NotAwaitingPermitPayment { .. }) => Ok(()),
        Err(err) => Err(err.into()),
    }
}
