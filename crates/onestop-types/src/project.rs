//! Projects: permit applications and the staged review machine.
//!
//! A Project moves through draft, in-review, pending-permit-payment,
//! approved, and rejected states. While in review it points at exactly
//! one configured ReviewStage; every reviewer decision is retained as
//! an append-only ReviewRecord.

use crate::account::{BusinessId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Project Identifier ───────────────────────────────────────────────

/// Unique identifier for a permit application
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Stage Name ───────────────────────────────────────────────────────

/// Name of one review stage within a module (`level1`, `level2`, `final`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageName(pub String);

impl StageName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Project Status ───────────────────────────────────────────────────

/// Lifecycle state of a permit application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Being assembled by the applicant
    #[default]
    Draft,
    /// Inside the staged review chain
    InReview,
    /// All stages approved, waiting for the permit fee
    PendingPermitPayment,
    /// Permit fee confirmed, application granted
    Approved,
    /// Refused by a reviewer (may be revised and resubmitted)
    Rejected,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::PendingPermitPayment => "pending_permit_payment",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "in_review" => Some(Self::InReview),
            "pending_permit_payment" => Some(Self::PendingPermitPayment),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Approved applications never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

// ── Project ──────────────────────────────────────────────────────────

/// One permit application
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier
    pub id: ProjectId,
    /// The council module the application belongs to (e.g. `myskb`)
    pub module: String,
    /// The account that created the application
    pub applicant: UserId,
    /// The business the application is filed under
    pub business_id: BusinessId,
    /// Application title
    pub title: String,
    /// Address of the proposed site
    pub site_address: String,
    /// Current lifecycle state
    pub status: ProjectStatus,
    /// The stage the review currently sits at (`Some` iff in review)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageName>,
    /// When the application was created
    pub created_at: DateTime<Utc>,
    /// When the application was last updated
    pub updated_at: DateTime<Utc>,
    /// When the application was last submitted for review
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the review concluded (completed or rejected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Create a new draft application
    pub fn new(
        module: impl Into<String>,
        applicant: UserId,
        business_id: BusinessId,
        title: impl Into<String>,
        site_address: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::generate(),
            module: module.into(),
            applicant,
            business_id,
            title: title.into(),
            site_address: site_address.into(),
            status: ProjectStatus::Draft,
            current_stage: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            decided_at: None,
        }
    }

    /// Enter review at the first enabled stage
    pub fn begin_review(&mut self, first_stage: StageName) {
        let now = Utc::now();
        self.status = ProjectStatus::InReview;
        self.current_stage = Some(first_stage);
        self.submitted_at = Some(now);
        self.decided_at = None;
        self.updated_at = now;
    }

    /// Move the review pointer to the next enabled stage
    pub fn advance_to(&mut self, stage: StageName) {
        self.current_stage = Some(stage);
        self.updated_at = Utc::now();
    }

    /// Conclude the review chain; the permit fee is now due
    pub fn await_permit_payment(&mut self) {
        let now = Utc::now();
        self.status = ProjectStatus::PendingPermitPayment;
        self.current_stage = None;
        self.decided_at = Some(now);
        self.updated_at = now;
    }

    /// Refuse the application and leave the review chain
    pub fn reject(&mut self) {
        let now = Utc::now();
        self.status = ProjectStatus::Rejected;
        self.current_stage = None;
        self.decided_at = Some(now);
        self.updated_at = now;
    }

    /// Grant the application once the permit fee is confirmed
    pub fn approve(&mut self) {
        self.status = ProjectStatus::Approved;
        self.updated_at = Utc::now();
    }

    // ── Query methods ────────────────────────────────────────────────

    /// Drafts are the only editable applications
    pub fn is_editable(&self) -> bool {
        self.status == ProjectStatus::Draft
    }

    /// Drafts and rejected applications may be submitted
    pub fn can_submit(&self) -> bool {
        matches!(self.status, ProjectStatus::Draft | ProjectStatus::Rejected)
    }

    pub fn is_in_review(&self) -> bool {
        self.status == ProjectStatus::InReview
    }

    /// The stage pointer must be present exactly while in review
    pub fn stage_pointer_consistent(&self) -> bool {
        self.current_stage.is_some() == (self.status == ProjectStatus::InReview)
    }
}

// ── Review Stage ─────────────────────────────────────────────────────

/// One configured review stage of a council module
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewStage {
    /// The module the stage belongs to
    pub module: String,
    /// Stage name, unique within the module
    pub name: StageName,
    /// Order within the module's chain
    pub ordinal: u32,
    /// Disabled stages are skipped during advancement
    pub enabled: bool,
    /// Emails of the officers assigned to this stage
    pub reviewers: Vec<String>,
    /// When the stage configuration was last changed
    pub updated_at: DateTime<Utc>,
}

impl ReviewStage {
    pub fn new(module: impl Into<String>, name: StageName, ordinal: u32) -> Self {
        Self {
            module: module.into(),
            name,
            ordinal,
            enabled: true,
            reviewers: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_reviewers(mut self, reviewers: Vec<String>) -> Self {
        self.reviewers = reviewers;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check whether an email is assigned to this stage
    pub fn is_assigned(&self, email: &str) -> bool {
        self.reviewers
            .iter()
            .any(|r| r.eq_ignore_ascii_case(email))
    }
}

// ── Review Decision ──────────────────────────────────────────────────

/// Outcome of one reviewer decision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

// ── Review Record ────────────────────────────────────────────────────

/// One entry in the append-only review history of a project
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub project_id: ProjectId,
    /// The stage at which the decision was taken
    pub stage: StageName,
    pub decision: ReviewDecision,
    /// Email of the deciding reviewer
    pub reviewer_email: String,
    /// Free-form remarks left by the reviewer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ReviewRecord {
    pub fn new(
        project_id: ProjectId,
        stage: StageName,
        decision: ReviewDecision,
        reviewer_email: impl Into<String>,
        remarks: Option<String>,
    ) -> Self {
        Self {
            project_id,
            stage,
            decision,
            reviewer_email: reviewer_email.into(),
            remarks,
            decided_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_project() -> Project {
        Project::new(
            "myskb",
            UserId::new("user-1"),
            BusinessId::new("biz-1"),
            "Billboard at Jalan Hang Tuah",
            "Lot 12, Jalan Hang Tuah, Melaka",
        )
    }

    #[test]
    fn test_new_project_is_draft() {
        let project = make_project();
        assert_eq!(project.status, ProjectStatus::Draft);
        assert!(project.is_editable());
        assert!(project.can_submit());
        assert!(project.stage_pointer_consistent());
    }

    #[test]
    fn test_review_lifecycle_keeps_pointer_consistent() {
        let mut project = make_project();

        project.begin_review(StageName::new("level1"));
        assert!(project.is_in_review());
        assert_eq!(project.current_stage, Some(StageName::new("level1")));
        assert!(project.submitted_at.is_some());
        assert!(project.stage_pointer_consistent());

        project.advance_to(StageName::new("level2"));
        assert_eq!(project.current_stage, Some(StageName::new("level2")));

        project.await_permit_payment();
        assert_eq!(project.status, ProjectStatus::PendingPermitPayment);
        assert!(project.current_stage.is_none());
        assert!(project.decided_at.is_some());
        assert!(project.stage_pointer_consistent());

        project.approve();
        assert_eq!(project.status, ProjectStatus::Approved);
        assert!(project.status.is_terminal());
    }

    #[test]
    fn test_reject_clears_pointer_and_allows_resubmit() {
        let mut project = make_project();
        project.begin_review(StageName::new("level1"));
        project.reject();

        assert_eq!(project.status, ProjectStatus::Rejected);
        assert!(project.current_stage.is_none());
        assert!(project.can_submit());
        assert!(!project.is_editable());

        project.begin_review(StageName::new("level1"));
        assert!(project.is_in_review());
        assert!(project.decided_at.is_none());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            ProjectStatus::Draft,
            ProjectStatus::InReview,
            ProjectStatus::PendingPermitPayment,
            ProjectStatus::Approved,
            ProjectStatus::Rejected,
        ] {
            assert_eq!(ProjectStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProjectStatus::parse("litigation"), None);
    }

    #[test]
    fn test_stage_assignment_is_case_insensitive() {
        let stage = ReviewStage::new("myskb", StageName::new("level1"), 1)
            .with_reviewers(vec!["Officer.One@mbmb.gov.my".to_string()]);
        assert!(stage.is_assigned("officer.one@mbmb.gov.my"));
        assert!(!stage.is_assigned("someone.else@mbmb.gov.my"));
    }

    #[test]
    fn test_disabled_stage_flag() {
        let stage = ReviewStage::new("myskb", StageName::new("level2"), 2).with_enabled(false);
        assert!(!stage.enabled);
    }

    #[test]
    fn test_review_record_retains_remarks() {
        let record = ReviewRecord::new(
            ProjectId::new("proj-1"),
            StageName::new("final"),
            ReviewDecision::Rejected,
            "officer.one@mbmb.gov.my",
            Some("incomplete drawings".to_string()),
        );
        assert_eq!(record.decision, ReviewDecision::Rejected);
        assert_eq!(record.remarks.as_deref(), Some("incomplete drawings"));
    }
}
