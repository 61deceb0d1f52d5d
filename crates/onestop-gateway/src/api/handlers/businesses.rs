//! Business and team management handlers

use crate::api::extract::{CurrentUser, WindowParams};
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use onestop_accounts::NewBusiness;
use onestop_types::{Business, BusinessId, BusinessMember, BusinessRole, InvitationId, TeamInvitation};
use serde::Deserialize;

/// Business registration request
#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub name: String,
    pub ssm_number: String,
}

/// Register a business under the caller's account
pub async fn create_business(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateBusinessRequest>,
) -> ApiResult<Json<Business>> {
    let business = state
        .accounts
        .register_business(
            &user,
            NewBusiness {
                name: request.name,
                ssm_number: request.ssm_number,
            },
        )
        .await?;
    Ok(Json(business))
}

/// List the businesses the caller belongs to
pub async fn list_businesses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Business>>> {
    let businesses = state.accounts.businesses_for(&user.id).await?;
    Ok(Json(businesses))
}

/// List the team of a business. Members only.
pub async fn list_members(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<BusinessMember>>> {
    let members = state
        .accounts
        .list_members(&user, &BusinessId::new(id))
        .await?;
    Ok(Json(members))
}

/// Invitation request
#[derive(Debug, Deserialize)]
pub struct InviteMemberRequest {
    pub email: String,
    #[serde(default)]
    pub role: BusinessRole,
}

/// Invite an email address onto the team. Owners and managers only.
/// The returned invitation carries the acceptance token.
pub async fn invite_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<InviteMemberRequest>,
) -> ApiResult<Json<TeamInvitation>> {
    let invitation = state
        .accounts
        .invite_member(&user, &BusinessId::new(id), &request.email, request.role)
        .await?;
    Ok(Json(invitation))
}

/// List a business's invitations. Members only.
pub async fn list_invitations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<Vec<TeamInvitation>>> {
    let invitations = state
        .accounts
        .list_invitations(&user, &BusinessId::new(id), params.window())
        .await?;
    Ok(Json(invitations))
}

/// Invitation acceptance request
#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub token: String,
}

/// Accept an invitation addressed to the caller's email
pub async fn accept_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<AcceptInvitationRequest>,
) -> ApiResult<Json<BusinessMember>> {
    let member = state
        .accounts
        .accept_invitation(&user, &request.token)
        .await?;
    Ok(Json(member))
}

/// Withdraw a pending invitation. Owners and managers only.
pub async fn revoke_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TeamInvitation>> {
    let invitation = state
        .accounts
        .revoke_invitation(&user, &InvitationId::new(id))
        .await?;
    Ok(Json(invitation))
}
