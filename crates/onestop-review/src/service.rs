//! Review service: stage configuration, project lifecycle and decisions.

use crate::error::{ReviewError, ReviewResult};
use crate::gate::PaymentGate;
use crate::stages::{find_stage, first_enabled, next_enabled_after};
use chrono::Utc;
use onestop_storage::{AuditAppend, PlatformStore, QueryWindow};
use onestop_types::{
    BusinessId, Notification, PlatformRole, Project, ProjectId, ProjectStatus, ReviewDecision,
    ReviewRecord, ReviewStage, StageName, UserAccount, UserId,
};
use std::sync::Arc;

/// Request to create or replace one stage of a module's chain
#[derive(Clone, Debug)]
pub struct StageUpsert {
    pub module: String,
    pub name: String,
    pub ordinal: u32,
    pub enabled: bool,
    pub reviewers: Vec<String>,
}

/// Request to create a draft application
#[derive(Clone, Debug)]
pub struct NewProject {
    pub business_id: BusinessId,
    pub module: String,
    pub title: String,
    pub site_address: String,
}

/// Partial update for a draft application
#[derive(Clone, Debug, Default)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub site_address: Option<String>,
}

/// Review service over a platform store and a payment gate
pub struct ReviewService<S: ?Sized> {
    store: Arc<S>,
    gate: Arc<dyn PaymentGate>,
}

impl<S: PlatformStore + ?Sized> ReviewService<S> {
    pub fn new(store: Arc<S>, gate: Arc<dyn PaymentGate>) -> Self {
        Self { store, gate }
    }

    // ── Stage Configuration ──────────────────────────────────────────

    /// Create or replace a stage. Admin only.
    ///
    /// Reviewer emails are lowercased and deduplicated.
    pub async fn upsert_stage(
        &self,
        actor: &UserAccount,
        request: StageUpsert,
    ) -> ReviewResult<ReviewStage> {
        if actor.role != PlatformRole::Admin {
            return Err(ReviewError::Forbidden(
                "only admins may configure review stages".to_string(),
            ));
        }
        let module = request.module.trim().to_string();
        let name = request.name.trim().to_string();
        if module.is_empty() || name.is_empty() {
            return Err(ReviewError::InvalidInput(
                "module and stage name must not be empty".to_string(),
            ));
        }

        let mut reviewers: Vec<String> = Vec::new();
        for email in &request.reviewers {
            let email = email.trim().to_ascii_lowercase();
            if email.is_empty() {
                continue;
            }
            if !reviewers.contains(&email) {
                reviewers.push(email);
            }
        }

        let stage = ReviewStage::new(module.clone(), StageName::new(name), request.ordinal)
            .with_enabled(request.enabled)
            .with_reviewers(reviewers);
        self.store.upsert_stage(stage.clone()).await?;

        self.audit(
            &actor.id.0,
            "stage_configured",
            &format!("{module}/{}", stage.name),
            true,
            format!(
                "ordinal {} enabled {} reviewers {}",
                stage.ordinal,
                stage.enabled,
                stage.reviewers.len()
            ),
            serde_json::json!({ "reviewers": stage.reviewers }),
        )
        .await?;

        tracing::info!(module = %stage.module, stage = %stage.name, "review stage configured");
        Ok(stage)
    }

    /// A module's stages in ordinal order.
    pub async fn list_stages(&self, module: &str) -> ReviewResult<Vec<ReviewStage>> {
        Ok(self.store.list_stages(module).await?)
    }

    // ── Project Lifecycle ────────────────────────────────────────────

    /// Create a draft application. The applicant must belong to the business.
    pub async fn create_project(
        &self,
        actor: &UserAccount,
        request: NewProject,
    ) -> ReviewResult<Project> {
        self.require_member(&request.business_id, &actor.id).await?;

        let module = request.module.trim().to_string();
        let title = request.title.trim().to_string();
        let site_address = request.site_address.trim().to_string();
        if module.is_empty() {
            return Err(ReviewError::InvalidInput(
                "module must not be empty".to_string(),
            ));
        }
        if title.is_empty() {
            return Err(ReviewError::InvalidInput(
                "title must not be empty".to_string(),
            ));
        }
        if site_address.is_empty() {
            return Err(ReviewError::InvalidInput(
                "site address must not be empty".to_string(),
            ));
        }

        let project = Project::new(
            module,
            actor.id.clone(),
            request.business_id,
            title,
            site_address,
        );
        self.store.insert_project(project.clone()).await?;

        self.audit(
            &actor.id.0,
            "project_created",
            &project.id.0,
            true,
            project.title.clone(),
            serde_json::json!({ "module": project.module, "business_id": project.business_id.0 }),
        )
        .await?;

        tracing::info!(project_id = %project.id, module = %project.module, "project created");
        Ok(project)
    }

    /// Edit a draft. Members only; anything past `Draft` is immutable.
    pub async fn update_project(
        &self,
        actor: &UserAccount,
        id: &ProjectId,
        update: UpdateProject,
    ) -> ReviewResult<Project> {
        let mut project = self.get_record(id).await?;
        self.require_member(&project.business_id, &actor.id).await?;

        if !project.is_editable() {
            return Err(ReviewError::ProjectNotEditable {
                status: project.status.as_str().to_string(),
            });
        }

        if let Some(title) = update.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ReviewError::InvalidInput(
                    "title must not be empty".to_string(),
                ));
            }
            project.title = title;
        }
        if let Some(site_address) = update.site_address {
            let site_address = site_address.trim().to_string();
            if site_address.is_empty() {
                return Err(ReviewError::InvalidInput(
                    "site address must not be empty".to_string(),
                ));
            }
            project.site_address = site_address;
        }
        project.updated_at = Utc::now();
        self.store.update_project(project.clone()).await?;

        self.audit(
            &actor.id.0,
            "project_updated",
            &project.id.0,
            true,
            project.title.clone(),
            serde_json::Value::Null,
        )
        .await?;

        Ok(project)
    }

    /// Fetch a project. Members of its business and staff only.
    pub async fn get_project(
        &self,
        actor: &UserAccount,
        id: &ProjectId,
    ) -> ReviewResult<Project> {
        let project = self.get_record(id).await?;
        if !actor.role.is_staff() {
            self.require_member(&project.business_id, &actor.id).await?;
        }
        Ok(project)
    }

    /// Projects of one business, newest first. Members only.
    pub async fn list_projects_for_business(
        &self,
        actor: &UserAccount,
        business: &BusinessId,
        window: QueryWindow,
    ) -> ReviewResult<Vec<Project>> {
        self.require_member(business, &actor.id).await?;
        Ok(self
            .store
            .list_projects_for_business(business, window)
            .await?)
    }

    /// The caller's own applications, newest first.
    pub async fn my_projects(
        &self,
        actor: &UserAccount,
        window: QueryWindow,
    ) -> ReviewResult<Vec<Project>> {
        Ok(self
            .store
            .list_projects_for_applicant(&actor.id, window)
            .await?)
    }

    /// In-review applications of a module, oldest submission first. Staff only.
    pub async fn review_queue(
        &self,
        actor: &UserAccount,
        module: &str,
        window: QueryWindow,
    ) -> ReviewResult<Vec<Project>> {
        if !actor.role.is_staff() {
            return Err(ReviewError::Forbidden(
                "requires an officer role".to_string(),
            ));
        }
        Ok(self.store.list_projects_in_review(module, window).await?)
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Submit a draft (or rejected) application into review.
    ///
    /// Requires at least one enabled stage for the module and every
    /// attached document to be verified. Entry is always at the first
    /// enabled stage, also on resubmission after a rejection.
    pub async fn submit(&self, actor: &UserAccount, id: &ProjectId) -> ReviewResult<Project> {
        let mut project = self.get_record(id).await?;
        self.require_member(&project.business_id, &actor.id).await?;

        if !project.can_submit() {
            return Err(ReviewError::CannotSubmit {
                status: project.status.as_str().to_string(),
            });
        }

        let stages = self.store.list_stages(&project.module).await?;
        let first = first_enabled(&stages)
            .ok_or_else(|| ReviewError::NoEnabledStages(project.module.clone()))?;

        let documents = self.store.list_documents_for_project(id).await?;
        let pending = documents.iter().filter(|d| !d.is_verified()).count();
        if pending > 0 {
            return Err(ReviewError::DocumentsNotVerified { pending });
        }

        let entry_stage = first.name.clone();
        let reviewer_emails = first.reviewers.clone();
        project.begin_review(entry_stage.clone());
        self.store.update_project(project.clone()).await?;

        for email in &reviewer_emails {
            if let Some(reviewer) = self.store.get_user_by_email(email).await? {
                let notification = Notification::new(
                    reviewer.id,
                    "New application for review",
                    format!("{} entered stage {}", project.title, entry_stage),
                )
                .with_data(serde_json::json!({ "project_id": project.id.0 }));
                self.store.enqueue_notification(notification).await?;
            }
        }

        self.audit(
            &actor.id.0,
            "project_submitted",
            &project.id.0,
            true,
            format!("entered review at {entry_stage}"),
            serde_json::json!({ "module": project.module, "stage": entry_stage.0 }),
        )
        .await?;

        tracing::info!(
            project_id = %project.id,
            stage = %entry_stage,
            "project submitted for review"
        );
        Ok(project)
    }

    // ── Decisions ────────────────────────────────────────────────────

    /// Approve the current stage.
    ///
    /// Advances the pointer to the next enabled stage. On the last enabled
    /// stage the processing fee must be settled; when it is, the project
    /// moves to `PendingPermitPayment` and leaves the chain. An unpaid fee
    /// refuses the approval without touching any state.
    pub async fn approve(
        &self,
        reviewer: &UserAccount,
        id: &ProjectId,
        remarks: Option<String>,
    ) -> ReviewResult<Project> {
        let (mut project, stage_name, stages) = self.decision_context(reviewer, id).await?;

        match next_enabled_after(&stages, &stage_name) {
            Some(next) => {
                let next_name = next.name.clone();
                project.advance_to(next_name.clone());
                self.store.update_project(project.clone()).await?;

                self.notify_applicant(
                    &project,
                    "Application update",
                    format!("{} advanced to stage {}", project.title, next_name),
                )
                .await?;

                tracing::info!(
                    project_id = %project.id,
                    from = %stage_name,
                    to = %next_name,
                    "review stage approved"
                );
            }
            None => {
                if !self.gate.processing_fee_paid(id).await? {
                    return Err(ReviewError::ProcessingFeeUnpaid);
                }
                project.await_permit_payment();
                self.store.update_project(project.clone()).await?;

                self.notify_applicant(
                    &project,
                    "Review complete",
                    format!("{} passed review; the permit fee is now due", project.title),
                )
                .await?;

                tracing::info!(
                    project_id = %project.id,
                    stage = %stage_name,
                    "final review stage approved"
                );
            }
        }

        self.store
            .append_review(ReviewRecord::new(
                project.id.clone(),
                stage_name.clone(),
                ReviewDecision::Approved,
                reviewer.email.clone(),
                remarks,
            ))
            .await?;
        self.audit(
            &reviewer.id.0,
            "review_approved",
            &project.id.0,
            true,
            format!("stage {stage_name}"),
            serde_json::json!({ "stage": stage_name.0 }),
        )
        .await?;

        Ok(project)
    }

    /// Reject the application at the current stage. Valid at any stage.
    pub async fn reject(
        &self,
        reviewer: &UserAccount,
        id: &ProjectId,
        remarks: Option<String>,
    ) -> ReviewResult<Project> {
        let (mut project, stage_name, _stages) = self.decision_context(reviewer, id).await?;

        project.reject();
        self.store.update_project(project.clone()).await?;

        self.store
            .append_review(ReviewRecord::new(
                project.id.clone(),
                stage_name.clone(),
                ReviewDecision::Rejected,
                reviewer.email.clone(),
                remarks.clone(),
            ))
            .await?;

        self.notify_applicant(
            &project,
            "Application rejected",
            match &remarks {
                Some(remarks) => format!(
                    "{} was rejected at stage {stage_name}: {remarks}",
                    project.title
                ),
                None => format!("{} was rejected at stage {stage_name}", project.title),
            },
        )
        .await?;
        self.audit(
            &reviewer.id.0,
            "review_rejected",
            &project.id.0,
            true,
            format!("stage {stage_name}"),
            serde_json::json!({ "stage": stage_name.0 }),
        )
        .await?;

        tracing::info!(project_id = %project.id, stage = %stage_name, "application rejected");
        Ok(project)
    }

    /// Grant the permit once the permit fee is confirmed paid.
    ///
    /// Driven by the payment callback path, so the actor is the system.
    pub async fn complete_permit_payment(&self, id: &ProjectId) -> ReviewResult<Project> {
        let mut project = self.get_record(id).await?;
        if project.status != ProjectStatus::PendingPermitPayment {
            return Err(ReviewError::NotAwaitingPermitPayment {
                status: project.status.as_str().to_string(),
            });
        }

        project.approve();
        self.store.update_project(project.clone()).await?;

        self.notify_applicant(
            &project,
            "Application approved",
            format!("{} has been approved", project.title),
        )
        .await?;
        self.audit(
            "system",
            "project_approved",
            &project.id.0,
            true,
            project.title.clone(),
            serde_json::Value::Null,
        )
        .await?;

        tracing::info!(project_id = %project.id, "project approved");
        Ok(project)
    }

    /// The append-only decision history of a project.
    pub async fn history(
        &self,
        actor: &UserAccount,
        id: &ProjectId,
    ) -> ReviewResult<Vec<ReviewRecord>> {
        let project = self.get_record(id).await?;
        if !actor.role.is_staff() {
            self.require_member(&project.business_id, &actor.id).await?;
        }
        Ok(self.store.list_reviews_for_project(id).await?)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Load the project and resolve the stage the decision applies to.
    ///
    /// Checks, in order: project exists, is in review, carries a stage
    /// pointer, the stage still exists in configuration, and the reviewer
    /// is staff assigned to it.
    async fn decision_context(
        &self,
        reviewer: &UserAccount,
        id: &ProjectId,
    ) -> ReviewResult<(Project, StageName, Vec<ReviewStage>)> {
        let project = self.get_record(id).await?;
        if !project.is_in_review() {
            return Err(ReviewError::ProjectNotInReview {
                status: project.status.as_str().to_string(),
            });
        }
        let stage_name = project
            .current_stage
            .clone()
            .ok_or_else(|| ReviewError::StagePointerMissing(project.id.clone()))?;

        let stages = self.store.list_stages(&project.module).await?;
        let stage = find_stage(&stages, &stage_name).ok_or_else(|| ReviewError::StageMissing {
            module: project.module.clone(),
            name: stage_name.0.clone(),
        })?;

        if !reviewer.role.is_staff() || !stage.is_assigned(&reviewer.email) {
            return Err(ReviewError::NotAStageReviewer);
        }

        Ok((project, stage_name, stages))
    }

    async fn get_record(&self, id: &ProjectId) -> ReviewResult<Project> {
        self.store
            .get_project(id)
            .await?
            .ok_or_else(|| ReviewError::ProjectNotFound(id.clone()))
    }

    async fn require_member(&self, business: &BusinessId, user: &UserId) -> ReviewResult<()> {
        self.store
            .get_member(business, user)
            .await?
            .map(|_| ())
            .ok_or(ReviewError::NotAMember)
    }

    async fn notify_applicant(
        &self,
        project: &Project,
        title: &str,
        body: String,
    ) -> ReviewResult<()> {
        let notification = Notification::new(project.applicant.clone(), title, body)
            .with_data(serde_json::json!({ "project_id": project.id.0 }));
        self.store.enqueue_notification(notification).await?;
        Ok(())
    }

    async fn audit(
        &self,
        actor: &str,
        action: &str,
        subject: &str,
        success: bool,
        message: String,
        payload: serde_json::Value,
    ) -> ReviewResult<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateError;
    use async_trait::async_trait;
    use onestop_storage::memory::InMemoryStore;
    use onestop_storage::{AccountStore, DocumentStore};
    use onestop_types::{Business, BusinessMember, BusinessRole, DocumentRecord};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubGate {
        paid: AtomicBool,
    }

    impl StubGate {
        fn paid() -> Arc<Self> {
            Arc::new(Self {
                paid: AtomicBool::new(true),
            })
        }

        fn unpaid() -> Arc<Self> {
            Arc::new(Self {
                paid: AtomicBool::new(false),
            })
        }

        fn settle(&self) {
            self.paid.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PaymentGate for StubGate {
        async fn processing_fee_paid(&self, _project: &ProjectId) -> Result<bool, GateError> {
            Ok(self.paid.load(Ordering::SeqCst))
        }
    }

    fn admin() -> UserAccount {
        UserAccount::new("Admin", "admin@mbmb.gov.my", "+60130000000", "800101105678")
            .with_role(PlatformRole::Admin)
    }

    fn officer(email: &str) -> UserAccount {
        UserAccount::new("Officer", email, "+60131112222", "750505045678")
            .with_role(PlatformRole::Officer)
    }

    fn applicant() -> UserAccount {
        UserAccount::new(
            "Aisyah Rahman",
            "aisyah@example.com",
            "+60123456789",
            "901231105678",
        )
    }

    async fn seed_membership(store: &Arc<InMemoryStore>, user: &UserAccount) -> BusinessId {
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
        business.id
    }

    async fn seed_chain(svc: &ReviewService<InMemoryStore>) {
        let admin = admin();
        for (name, ordinal, enabled, reviewer) in [
            ("level1", 1, true, "one@mbmb.gov.my"),
            ("level2", 2, false, "two@mbmb.gov.my"),
            ("final", 3, true, "final@mbmb.gov.my"),
        ] {
            svc.upsert_stage(
                &admin,
                StageUpsert {
                    module: "myskb".to_string(),
                    name: name.to_string(),
                    ordinal,
                    enabled,
                    reviewers: vec![reviewer.to_string()],
                },
            )
            .await
            .unwrap();
        }
    }

    fn new_project(business_id: BusinessId) -> NewProject {
        NewProject {
            business_id,
            module: "myskb".to_string(),
            title: "Warehouse extension".to_string(),
            site_address: "Lot 12, Jalan Industri, Melaka".to_string(),
        }
    }

    async fn submitted_project(
        svc: &ReviewService<InMemoryStore>,
        store: &Arc<InMemoryStore>,
        user: &UserAccount,
    ) -> Project {
        let business_id = seed_membership(store, user).await;
        seed_chain(svc).await;
        let project = svc
            .create_project(user, new_project(business_id))
            .await
            .unwrap();
        svc.submit(user, &project.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_submission_enters_first_enabled_stage() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();

        let project = submitted_project(&svc, &store, &user).await;
        assert_eq!(project.status, ProjectStatus::InReview);
        assert_eq!(project.current_stage, Some(StageName::new("level1")));
        assert!(project.submitted_at.is_some());
    }

    #[tokio::test]
    async fn test_submit_without_enabled_stages_is_refused() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let business_id = seed_membership(&store, &user).await;

        let project = svc
            .create_project(&user, new_project(business_id))
            .await
            .unwrap();
        let result = svc.submit(&user, &project.id).await;
        assert!(matches!(result, Err(ReviewError::NoEnabledStages(_))));
    }

    #[tokio::test]
    async fn test_submit_with_unverified_documents_is_refused() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let business_id = seed_membership(&store, &user).await;
        seed_chain(&svc).await;

        let project = svc
            .create_project(&user, new_project(business_id))
            .await
            .unwrap();

        let mut document = DocumentRecord::new(
            user.id.clone(),
            "site-plan.pdf",
            "application/pdf",
            120_000,
            "ab".repeat(32),
            "uploads/site-plan.pdf",
        );
        document.project_id = Some(project.id.clone());
        store.insert_document(document).await.unwrap();

        let result = svc.submit(&user, &project.id).await;
        assert!(matches!(
            result,
            Err(ReviewError::DocumentsNotVerified { pending: 1 })
        ));
    }

    #[tokio::test]
    async fn test_approval_advances_and_skips_disabled_stage() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let project = submitted_project(&svc, &store, &user).await;

        let advanced = svc
            .approve(&officer("one@mbmb.gov.my"), &project.id, None)
            .await
            .unwrap();
        assert_eq!(advanced.status, ProjectStatus::InReview);
        assert_eq!(advanced.current_stage, Some(StageName::new("final")));
    }

    #[tokio::test]
    async fn test_final_approval_requires_processing_fee() {
        let store = Arc::new(InMemoryStore::new());
        let gate = StubGate::unpaid();
        let svc = ReviewService::new(store.clone(), gate.clone());
        let user = applicant();
        let project = submitted_project(&svc, &store, &user).await;

        svc.approve(&officer("one@mbmb.gov.my"), &project.id, None)
            .await
            .unwrap();

        let refused = svc
            .approve(&officer("final@mbmb.gov.my"), &project.id, None)
            .await;
        assert!(matches!(refused, Err(ReviewError::ProcessingFeeUnpaid)));

        // Nothing moved and no record was appended for the refused decision.
        let unchanged = svc
            .get_project(&officer("final@mbmb.gov.my"), &project.id)
            .await
            .unwrap();
        assert_eq!(unchanged.status, ProjectStatus::InReview);
        assert_eq!(unchanged.current_stage, Some(StageName::new("final")));
        let history = svc
            .history(&officer("final@mbmb.gov.my"), &project.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);

        gate.settle();
        let done = svc
            .approve(&officer("final@mbmb.gov.my"), &project.id, None)
            .await
            .unwrap();
        assert_eq!(done.status, ProjectStatus::PendingPermitPayment);
        assert_eq!(done.current_stage, None);
        assert!(done.decided_at.is_some());
    }

    #[tokio::test]
    async fn test_unassigned_reviewer_is_refused() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let project = submitted_project(&svc, &store, &user).await;

        let result = svc
            .approve(&officer("final@mbmb.gov.my"), &project.id, None)
            .await;
        assert!(matches!(result, Err(ReviewError::NotAStageReviewer)));

        let result = svc.approve(&user, &project.id, None).await;
        assert!(matches!(result, Err(ReviewError::NotAStageReviewer)));
    }

    #[tokio::test]
    async fn test_rejection_clears_pointer_and_allows_resubmission() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let project = submitted_project(&svc, &store, &user).await;

        let rejected = svc
            .reject(
                &officer("one@mbmb.gov.my"),
                &project.id,
                Some("incomplete site plan".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, ProjectStatus::Rejected);
        assert_eq!(rejected.current_stage, None);
        assert!(rejected.decided_at.is_some());

        let resubmitted = svc.submit(&user, &project.id).await.unwrap();
        assert_eq!(resubmitted.status, ProjectStatus::InReview);
        assert_eq!(resubmitted.current_stage, Some(StageName::new("level1")));

        let history = svc
            .history(&officer("one@mbmb.gov.my"), &project.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].decision, ReviewDecision::Rejected);
    }

    #[tokio::test]
    async fn test_permit_payment_grants_the_application() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let project = submitted_project(&svc, &store, &user).await;

        let early = svc.complete_permit_payment(&project.id).await;
        assert!(matches!(
            early,
            Err(ReviewError::NotAwaitingPermitPayment { .. })
        ));

        svc.approve(&officer("one@mbmb.gov.my"), &project.id, None)
            .await
            .unwrap();
        svc.approve(&officer("final@mbmb.gov.my"), &project.id, None)
            .await
            .unwrap();

        let approved = svc.complete_permit_payment(&project.id).await.unwrap();
        assert_eq!(approved.status, ProjectStatus::Approved);
    }

    #[tokio::test]
    async fn test_decisions_require_in_review_status() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let business_id = seed_membership(&store, &user).await;
        seed_chain(&svc).await;
        let project = svc
            .create_project(&user, new_project(business_id))
            .await
            .unwrap();

        let result = svc
            .approve(&officer("one@mbmb.gov.my"), &project.id, None)
            .await;
        assert!(matches!(result, Err(ReviewError::ProjectNotInReview { .. })));
    }

    #[tokio::test]
    async fn test_update_is_draft_only() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let project = submitted_project(&svc, &store, &user).await;

        let result = svc
            .update_project(
                &user,
                &project.id,
                UpdateProject {
                    title: Some("New title".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ReviewError::ProjectNotEditable { .. })));
    }

    #[tokio::test]
    async fn test_stage_configuration_is_admin_only() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store, StubGate::paid());

        let result = svc
            .upsert_stage(
                &officer("one@mbmb.gov.my"),
                StageUpsert {
                    module: "myskb".to_string(),
                    name: "level1".to_string(),
                    ordinal: 1,
                    enabled: true,
                    reviewers: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(ReviewError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_non_member_cannot_create_or_submit() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());
        let user = applicant();
        let outsider = UserAccount::new(
            "Lina Tan",
            "lina@example.com",
            "+60171234567",
            "880808085678",
        );
        let business_id = seed_membership(&store, &user).await;
        seed_chain(&svc).await;

        let result = svc
            .create_project(&outsider, new_project(business_id.clone()))
            .await;
        assert!(matches!(result, Err(ReviewError::NotAMember)));

        let project = svc
            .create_project(&user, new_project(business_id))
            .await
            .unwrap();
        let result = svc.submit(&outsider, &project.id).await;
        assert!(matches!(result, Err(ReviewError::NotAMember)));
    }

    #[tokio::test]
    async fn test_reviewer_emails_are_normalized() {
        let store = Arc::new(InMemoryStore::new());
        let svc = ReviewService::new(store.clone(), StubGate::paid());

        let stage = svc
            .upsert_stage(
                &admin(),
                StageUpsert {
                    module: "myskb".to_string(),
                    name: "level1".to_string(),
                    ordinal: 1,
                    enabled: true,
                    reviewers: vec![
                        " One@MBMB.gov.my ".to_string(),
                        "one@mbmb.gov.my".to_string(),
                        "".to_string(),
                    ],
                },
            )
            .await
            .unwrap();
        assert_eq!(stage.reviewers, vec!["one@mbmb.gov.my".to_string()]);
        assert!(stage.is_assigned("ONE@mbmb.gov.my"));
    }
}
