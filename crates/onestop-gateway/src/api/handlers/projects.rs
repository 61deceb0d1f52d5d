//! Application (project) lifecycle handlers
//!
//! Submission and final-stage approval also drive billing: submitting an
//! application issues its processing-fee invoice, and passing the last
//! review stage issues the permit-fee invoice. Both issuances tolerate a
//! duplicate so retried requests do not fail after the state change landed.

use crate::api::extract::{CurrentUser, WindowParams};
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use onestop_billing::BillingError;
use onestop_review::{NewProject, UpdateProject};
use onestop_types::{BusinessId, Invoice, Project, ProjectId, ProjectStatus, ReviewRecord};
use serde::{Deserialize, Serialize};

/// Project creation request
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub business_id: String,
    pub module: String,
    pub title: String,
    pub site_address: String,
}

/// Create a draft application under a business
pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Json<Project>> {
    let project = state
        .review
        .create_project(
            &user,
            NewProject {
                business_id: BusinessId::new(request.business_id),
                module: request.module,
                title: request.title,
                site_address: request.site_address,
            },
        )
        .await?;
    Ok(Json(project))
}

/// Listing filter
#[derive(Debug, Deserialize)]
pub struct ProjectListParams {
    pub business_id: Option<String>,
    #[serde(flatten)]
    pub window: WindowParams,
}

/// List projects: a business's applications when `business_id` is given,
/// otherwise everything visible to the caller across their memberships.
pub async fn list_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ProjectListParams>,
) -> ApiResult<Json<Vec<Project>>> {
    let window = params.window.window();
    let projects = match params.business_id {
        Some(business_id) => {
            state
                .review
                .list_projects_for_business(&user, &BusinessId::new(business_id), window)
                .await?
        }
        None => state.review.my_projects(&user, window).await?,
    };
    Ok(Json(projects))
}

/// Fetch one project
pub async fn get_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Project>> {
    let project = state.review.get_project(&user, &ProjectId::new(id)).await?;
    Ok(Json(project))
}

/// Project update request; absent fields are left untouched
#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub site_address: Option<String>,
}

/// Edit a draft or rejected project
pub async fn update_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    let project = state
        .review
        .update_project(
            &user,
            &ProjectId::new(id),
            UpdateProject {
                title: request.title,
                site_address: request.site_address,
            },
        )
        .await?;
    Ok(Json(project))
}

/// Submission outcome: the project in review plus the processing-fee
/// invoice, when this call was the one that issued it.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub project: Project,
    pub processing_invoice: Option<Invoice>,
}

/// Submit a project into its review chain and bill the processing fee
pub async fn submit_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<SubmitResponse>> {
    let id = ProjectId::new(id);
    let project = state.review.submit(&user, &id).await?;

    let processing_invoice = match state.billing.create_processing_invoice(&id).await {
        Ok(invoice) => Some(invoice),
        Err(BillingError::DuplicateInvoice { .. }) => None,
        Err(err) => return Err(err.into()),
    };

    Ok(Json(SubmitResponse {
        project,
        processing_invoice,
    }))
}

/// Reviewer decision request
#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    pub remarks: Option<String>,
}

/// Approval outcome: the advanced project plus the permit-fee invoice if
/// this approval cleared the final stage.
#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub project: Project,
    pub permit_invoice: Option<Invoice>,
}

/// Approve the current stage. Clearing the last stage parks the project
/// on the permit fee and issues that invoice.
pub async fn approve_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<ApproveResponse>> {
    let id = ProjectId::new(id);
    let remarks = request.and_then(|Json(body)| body.remarks);
    let project = state.review.approve(&user, &id, remarks).await?;

    let permit_invoice = if project.status == ProjectStatus::PendingPermitPayment {
        match state.billing.create_permit_invoice(&id).await {
            Ok(invoice) => Some(invoice),
            Err(BillingError::DuplicateInvoice { .. }) => None,
            Err(err) => return Err(err.into()),
        }
    } else {
        None
    };

    Ok(Json(ApproveResponse {
        project,
        permit_invoice,
    }))
}

/// Reject the project at its current stage
pub async fn reject_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    request: Option<Json<DecisionRequest>>,
) -> ApiResult<Json<Project>> {
    let remarks = request.and_then(|Json(body)| body.remarks);
    let project = state
        .review
        .reject(&user, &ProjectId::new(id), remarks)
        .await?;
    Ok(Json(project))
}

/// The append-only decision trail of a project
pub async fn project_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ReviewRecord>>> {
    let history = state.review.history(&user, &ProjectId::new(id)).await?;
    Ok(Json(history))
}

/// Applications waiting on the caller within a module's review chain
pub async fn review_queue(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(module): Path<String>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<Vec<Project>>> {
    let queue = state
        .review
        .review_queue(&user, &module, params.window())
        .await?;
    Ok(Json(queue))
}
