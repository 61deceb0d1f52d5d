//! Billing service: invoice issuance, MBMB payment flow, fee gate.

use crate::error::{BillingError, BillingResult};
use crate::fees::FeeSchedule;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use onestop_mbmb::{MbmbApi, OutstandingBill, PaymentSession};
use onestop_review::{GateError, PaymentGate};
use onestop_storage::{AuditAppend, PlatformStore};
use onestop_types::{
    BusinessId, Invoice, InvoiceId, InvoiceKind, InvoiceStatus, Notification, PlatformRole,
    Project, ProjectId, UserAccount, UserId,
};
use std::sync::Arc;

/// Billing service over a platform store and the MBMB client
pub struct BillingService<S: ?Sized, M: ?Sized> {
    store: Arc<S>,
    mbmb: Arc<M>,
    fees: FeeSchedule,
}

impl<S: PlatformStore + ?Sized, M: MbmbApi + ?Sized> BillingService<S, M> {
    pub fn new(store: Arc<S>, mbmb: Arc<M>) -> Self {
        Self {
            store,
            mbmb,
            fees: FeeSchedule::default(),
        }
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    // ── Issuance ─────────────────────────────────────────────────────

    /// Issue the processing-fee invoice for a project.
    pub async fn create_processing_invoice(&self, project: &ProjectId) -> BillingResult<Invoice> {
        self.create_invoice(project, InvoiceKind::ProcessingFee)
            .await
    }

    /// Issue the permit-fee invoice for a project.
    pub async fn create_permit_invoice(&self, project: &ProjectId) -> BillingResult<Invoice> {
        self.create_invoice(project, InvoiceKind::PermitFee).await
    }

    /// One live invoice per kind per project; a cancelled invoice may be
    /// replaced.
    async fn create_invoice(
        &self,
        project_id: &ProjectId,
        kind: InvoiceKind,
    ) -> BillingResult<Invoice> {
        let project = self.get_project(project_id).await?;

        let existing = self.store.list_invoices_for_project(project_id).await?;
        if existing
            .iter()
            .any(|invoice| invoice.kind == kind && invoice.status != InvoiceStatus::Cancelled)
        {
            return Err(BillingError::DuplicateInvoice {
                kind: kind.as_str().to_string(),
            });
        }

        let amount_sen = self.fees.amount_for(&project.module, kind);
        if amount_sen <= 0 {
            return Err(BillingError::InvalidInput(format!(
                "fee schedule yields non-positive amount for module `{}`",
                project.module
            )));
        }

        let invoice = Invoice::new(project.id.clone(), kind, amount_sen);
        self.store.insert_invoice(invoice.clone()).await?;

        self.audit(
            "system",
            "invoice_issued",
            &invoice.id.0,
            true,
            format!("{} for {}", kind.as_str(), project.title),
            serde_json::json!({
                "project_id": project.id.0,
                "kind": kind.as_str(),
                "amount_sen": amount_sen,
            }),
        )
        .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            project_id = %project.id,
            kind = kind.as_str(),
            amount_sen,
            "invoice issued"
        );
        Ok(invoice)
    }

    // ── Payment Flow ─────────────────────────────────────────────────

    /// Open an MBMB checkout session for an invoice.
    ///
    /// Allowed while `Unpaid` or `PaymentPending`; the invoice id is the
    /// council order id, so re-initiation lands on the same session. The
    /// returned reference is stored and later matched by the callback.
    pub async fn initiate_payment(
        &self,
        actor: &UserAccount,
        id: &InvoiceId,
    ) -> BillingResult<PaymentSession> {
        let mut invoice = self.get_record(id).await?;
        let project = self.get_project(&invoice.project_id).await?;
        self.require_member(&project.business_id, &actor.id).await?;

        match invoice.status {
            InvoiceStatus::Unpaid | InvoiceStatus::PaymentPending => {}
            status => {
                return Err(BillingError::NotPayable {
                    status: status.as_str().to_string(),
                })
            }
        }

        let description = format!("{} for {}", fee_label(invoice.kind), project.title);
        let session = self
            .mbmb
            .create_payment(&invoice.id.0, invoice.amount_sen, &description)
            .await?;

        invoice.mark_payment_pending(session.reference.clone());
        self.store.update_invoice(invoice.clone()).await?;

        self.audit(
            &actor.id.0,
            "payment_initiated",
            &invoice.id.0,
            true,
            description,
            serde_json::json!({ "reference": session.reference }),
        )
        .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            reference = %session.reference,
            "payment session opened"
        );
        Ok(session)
    }

    /// Apply a council payment confirmation, keyed by the stored
    /// reference. Repeated confirmations for a paid invoice are a no-op.
    pub async fn confirm_payment(
        &self,
        reference: &str,
        receipt_no: &str,
        paid_at: DateTime<Utc>,
    ) -> BillingResult<Invoice> {
        let Some(mut invoice) = self.store.find_invoice_by_reference(reference).await? else {
            tracing::warn!(reference, "payment confirmation for unknown reference");
            return Err(BillingError::UnknownReference(reference.to_string()));
        };

        match invoice.status {
            InvoiceStatus::Paid => return Ok(invoice),
            InvoiceStatus::Cancelled => {
                return Err(BillingError::CannotConfirm {
                    status: invoice.status.as_str().to_string(),
                })
            }
            InvoiceStatus::Unpaid | InvoiceStatus::PaymentPending => {}
        }

        invoice.mark_paid(receipt_no, paid_at);
        self.store.update_invoice(invoice.clone()).await?;

        if let Ok(project) = self.get_project(&invoice.project_id).await {
            let notification = Notification::new(
                project.applicant.clone(),
                "Payment received",
                format!("Receipt {receipt_no} for {}", project.title),
            )
            .with_data(serde_json::json!({ "invoice_id": invoice.id.0 }));
            self.store.enqueue_notification(notification).await?;
        }

        self.audit(
            "mbmb",
            "payment_confirmed",
            &invoice.id.0,
            true,
            format!("receipt {receipt_no}"),
            serde_json::json!({ "reference": reference, "receipt_no": receipt_no }),
        )
        .await?;

        tracing::info!(invoice_id = %invoice.id, reference, receipt_no, "payment confirmed");
        Ok(invoice)
    }

    /// Poll MBMB for a pending invoice and apply the receipt if the
    /// council reports it settled. Covers a missed callback.
    pub async fn reconcile_payment(&self, id: &InvoiceId) -> BillingResult<Invoice> {
        let mut invoice = self.get_record(id).await?;
        if invoice.status != InvoiceStatus::PaymentPending {
            return Ok(invoice);
        }
        let Some(reference) = invoice.mbmb_reference.clone() else {
            return Ok(invoice);
        };

        let receipt = self.mbmb.fetch_receipt(&reference).await?;
        if !receipt.paid {
            return Ok(invoice);
        }

        let receipt_no = receipt.receipt_no.unwrap_or_else(|| reference.clone());
        invoice.mark_paid(&receipt_no, receipt.paid_at.unwrap_or_else(Utc::now));
        self.store.update_invoice(invoice.clone()).await?;

        self.audit(
            "system",
            "payment_reconciled",
            &invoice.id.0,
            true,
            format!("receipt {receipt_no}"),
            serde_json::json!({ "reference": reference, "receipt_no": receipt_no }),
        )
        .await?;

        tracing::info!(invoice_id = %invoice.id, reference, "payment reconciled from receipt");
        Ok(invoice)
    }

    /// Withdraw an invoice. Admin only; a paid invoice stays paid and a
    /// cancelled one is left as is.
    pub async fn cancel_invoice(
        &self,
        actor: &UserAccount,
        id: &InvoiceId,
    ) -> BillingResult<Invoice> {
        if actor.role != PlatformRole::Admin {
            return Err(BillingError::Forbidden(
                "only admins may cancel invoices".to_string(),
            ));
        }
        let mut invoice = self.get_record(id).await?;
        match invoice.status {
            InvoiceStatus::Cancelled => return Ok(invoice),
            InvoiceStatus::Paid => return Err(BillingError::AlreadySettled(invoice.id)),
            InvoiceStatus::Unpaid | InvoiceStatus::PaymentPending => {}
        }

        invoice.cancel();
        self.store.update_invoice(invoice.clone()).await?;

        self.audit(
            &actor.id.0,
            "invoice_cancelled",
            &invoice.id.0,
            true,
            String::new(),
            serde_json::Value::Null,
        )
        .await?;

        tracing::info!(invoice_id = %invoice.id, "invoice cancelled");
        Ok(invoice)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Outstanding council bills for an IC or SSM number, straight from
    /// MBMB.
    pub async fn outstanding_bills(&self, payer_id: &str) -> BillingResult<Vec<OutstandingBill>> {
        let payer_id = payer_id.trim();
        if payer_id.is_empty() {
            return Err(BillingError::InvalidInput(
                "payer id must not be empty".to_string(),
            ));
        }
        Ok(self.mbmb.lookup_bills(payer_id).await?)
    }

    /// Invoices of a project. Members of its business and staff only.
    pub async fn list_invoices(
        &self,
        actor: &UserAccount,
        project_id: &ProjectId,
    ) -> BillingResult<Vec<Invoice>> {
        let project = self.get_project(project_id).await?;
        if !actor.role.is_staff() {
            self.require_member(&project.business_id, &actor.id).await?;
        }
        Ok(self.store.list_invoices_for_project(project_id).await?)
    }

    /// Fetch one invoice. Members of its business and staff only.
    pub async fn get_invoice(&self, actor: &UserAccount, id: &InvoiceId) -> BillingResult<Invoice> {
        let invoice = self.get_record(id).await?;
        if !actor.role.is_staff() {
            let project = self.get_project(&invoice.project_id).await?;
            self.require_member(&project.business_id, &actor.id).await?;
        }
        Ok(invoice)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn get_record(&self, id: &InvoiceId) -> BillingResult<Invoice> {
        self.store
            .get_invoice(id)
            .await?
            .ok_or_else(|| BillingError::InvoiceNotFound(id.clone()))
    }

    async fn get_project(&self, id: &ProjectId) -> BillingResult<Project> {
        self.store
            .get_project(id)
            .await?
            .ok_or_else(|| BillingError::ProjectNotFound(id.clone()))
    }

    async fn require_member(&self, business: &BusinessId, user: &UserId) -> BillingResult<()> {
        self.store
            .get_member(business, user)
            .await?
            .map(|_| ())
            .ok_or(BillingError::NotAMember)
    }

    async fn audit(
        &self,
        actor: &str,
        action: &str,
        subject: &str,
        success: bool,
        message: String,
        payload: serde_json::Value,
    ) -> BillingResult<()> {
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

/// The fee gate consulted by the review chain: a project clears it once
/// a processing-fee invoice is paid.
#[async_trait]
impl<S: PlatformStore + ?Sized, M: MbmbApi + ?Sized> PaymentGate for BillingService<S, M> {
    async fn processing_fee_paid(&self, project: &ProjectId) -> Result<bool, GateError> {
        let invoices = self
            .store
            .list_invoices_for_project(project)
            .await
            .map_err(|e| GateError::Unavailable(e.to_string()))?;
        Ok(invoices
            .iter()
            .any(|invoice| invoice.kind == InvoiceKind::ProcessingFee && invoice.is_paid()))
    }
}

fn fee_label(kind: InvoiceKind) -> &'static str {
    match kind {
        InvoiceKind::ProcessingFee => "Processing fee",
        InvoiceKind::PermitFee => "Permit fee",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onestop_mbmb::StaticMbmb;
    use onestop_storage::memory::InMemoryStore;
    use onestop_storage::{AccountStore, ProjectStore};
    use onestop_types::{Business, BusinessMember, BusinessRole};

    fn applicant() -> UserAccount {
        UserAccount::new(
            "Aisyah Rahman",
            "aisyah@example.com",
            "+60123456789",
            "901231105678",
        )
    }

    fn admin() -> UserAccount {
        UserAccount::new("Admin", "admin@mbmb.gov.my", "+60130000000", "800101105678")
            .with_role(PlatformRole::Admin)
    }

    async fn seed_project(store: &Arc<InMemoryStore>, user: &UserAccount) -> Project {
        let business = Business::new("Rahman Trading", "202301012345", user.id.clone());
        store.create_business(business.clone()).await.unwrap();
        store
            .add_member(BusinessMember::new(
                business.id.clone(),
                user.id.clone(),
                BusinessRole::Owner,
            ))
            .await
            .unwrap();
        let project = Project::new(
            "myskb",
            user.id.clone(),
            business.id,
            "Warehouse extension",
            "Lot 12, Jalan Industri, Melaka",
        );
        store.insert_project(project.clone()).await.unwrap();
        project
    }

    fn service(
        store: &Arc<InMemoryStore>,
        mbmb: &Arc<StaticMbmb>,
    ) -> BillingService<InMemoryStore, StaticMbmb> {
        BillingService::new(store.clone(), mbmb.clone())
            .with_fees(FeeSchedule::default().with_processing_fee("myskb", 20_000))
    }

    #[tokio::test]
    async fn test_invoice_amount_comes_from_the_schedule() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);
        let user = applicant();
        let project = seed_project(&store, &user).await;

        let invoice = svc.create_processing_invoice(&project.id).await.unwrap();
        assert_eq!(invoice.kind, InvoiceKind::ProcessingFee);
        assert_eq!(invoice.amount_sen, 20_000);
        assert_eq!(invoice.currency, "MYR");
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);

        let duplicate = svc.create_processing_invoice(&project.id).await;
        assert!(matches!(
            duplicate,
            Err(BillingError::DuplicateInvoice { .. })
        ));

        // The permit fee is a separate lane and may still be issued.
        let permit = svc.create_permit_invoice(&project.id).await.unwrap();
        assert_eq!(permit.kind, InvoiceKind::PermitFee);
        assert_eq!(permit.amount_sen, 250_000);
    }

    #[tokio::test]
    async fn test_cancelled_invoice_can_be_reissued() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);
        let user = applicant();
        let project = seed_project(&store, &user).await;

        let invoice = svc.create_processing_invoice(&project.id).await.unwrap();
        svc.cancel_invoice(&admin(), &invoice.id).await.unwrap();
        let replacement = svc.create_processing_invoice(&project.id).await.unwrap();
        assert_ne!(replacement.id, invoice.id);

        let not_admin = svc.cancel_invoice(&user, &replacement.id).await;
        assert!(matches!(not_admin, Err(BillingError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_initiate_payment_opens_and_stores_the_session() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);
        let user = applicant();
        let project = seed_project(&store, &user).await;
        let invoice = svc.create_processing_invoice(&project.id).await.unwrap();

        let session = svc.initiate_payment(&user, &invoice.id).await.unwrap();
        assert_eq!(session.reference, format!("MBMB-{}", invoice.id));
        assert!(session.checkout_url.contains(&session.reference));

        let stored = svc.get_invoice(&user, &invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::PaymentPending);
        assert_eq!(stored.mbmb_reference.as_deref(), Some(session.reference.as_str()));

        // Re-initiation lands on the same council order.
        let again = svc.initiate_payment(&user, &invoice.id).await.unwrap();
        assert_eq!(again.reference, session.reference);
    }

    #[tokio::test]
    async fn test_initiate_requires_membership() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);
        let user = applicant();
        let outsider = UserAccount::new(
            "Lina Tan",
            "lina@example.com",
            "+60171234567",
            "880808085678",
        );
        let project = seed_project(&store, &user).await;
        let invoice = svc.create_processing_invoice(&project.id).await.unwrap();

        let result = svc.initiate_payment(&outsider, &invoice.id).await;
        assert!(matches!(result, Err(BillingError::NotAMember)));
    }

    #[tokio::test]
    async fn test_confirmation_is_keyed_and_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);
        let user = applicant();
        let project = seed_project(&store, &user).await;
        let invoice = svc.create_processing_invoice(&project.id).await.unwrap();
        let session = svc.initiate_payment(&user, &invoice.id).await.unwrap();

        let unknown = svc.confirm_payment("MBMB-nope", "RCT-1", Utc::now()).await;
        assert!(matches!(unknown, Err(BillingError::UnknownReference(_))));

        let paid = svc
            .confirm_payment(&session.reference, "RCT-2024-778", Utc::now())
            .await
            .unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.receipt_no.as_deref(), Some("RCT-2024-778"));
        assert!(paid.paid_at.is_some());

        let replay = svc
            .confirm_payment(&session.reference, "RCT-other", Utc::now())
            .await
            .unwrap();
        assert_eq!(replay.receipt_no.as_deref(), Some("RCT-2024-778"));
    }

    #[tokio::test]
    async fn test_cancelled_invoice_cannot_be_paid_or_confirmed() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);
        let user = applicant();
        let project = seed_project(&store, &user).await;
        let invoice = svc.create_processing_invoice(&project.id).await.unwrap();
        let session = svc.initiate_payment(&user, &invoice.id).await.unwrap();
        svc.cancel_invoice(&admin(), &invoice.id).await.unwrap();

        let initiate = svc.initiate_payment(&user, &invoice.id).await;
        assert!(matches!(initiate, Err(BillingError::NotPayable { .. })));

        let confirm = svc
            .confirm_payment(&session.reference, "RCT-1", Utc::now())
            .await;
        assert!(matches!(confirm, Err(BillingError::CannotConfirm { .. })));
    }

    #[tokio::test]
    async fn test_processing_gate_tracks_the_processing_invoice_only() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);
        let user = applicant();
        let project = seed_project(&store, &user).await;

        assert!(!svc.processing_fee_paid(&project.id).await.unwrap());

        let permit = svc.create_permit_invoice(&project.id).await.unwrap();
        let permit_session = svc.initiate_payment(&user, &permit.id).await.unwrap();
        svc.confirm_payment(&permit_session.reference, "RCT-P", Utc::now())
            .await
            .unwrap();
        assert!(!svc.processing_fee_paid(&project.id).await.unwrap());

        let invoice = svc.create_processing_invoice(&project.id).await.unwrap();
        let session = svc.initiate_payment(&user, &invoice.id).await.unwrap();
        svc.confirm_payment(&session.reference, "RCT-1", Utc::now())
            .await
            .unwrap();
        assert!(svc.processing_fee_paid(&project.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reconcile_applies_the_council_receipt() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);
        let user = applicant();
        let project = seed_project(&store, &user).await;
        let invoice = svc.create_processing_invoice(&project.id).await.unwrap();
        let session = svc.initiate_payment(&user, &invoice.id).await.unwrap();

        // Council has not settled yet: reconciliation leaves it pending.
        let pending = svc.reconcile_payment(&invoice.id).await.unwrap();
        assert_eq!(pending.status, InvoiceStatus::PaymentPending);

        mbmb.settle(&session.reference).await;
        let paid = svc.reconcile_payment(&invoice.id).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(
            paid.receipt_no.as_deref(),
            Some(format!("RCT-{}", session.reference).as_str())
        );
    }

    #[tokio::test]
    async fn test_outstanding_bills_surface_upstream_failures() {
        let store = Arc::new(InMemoryStore::new());
        let mbmb = Arc::new(StaticMbmb::new());
        let svc = service(&store, &mbmb);

        mbmb.break_with("scheduled maintenance").await;
        let result = svc.outstanding_bills("901231105678").await;
        assert!(matches!(result, Err(BillingError::Upstream(_))));
    }
}
