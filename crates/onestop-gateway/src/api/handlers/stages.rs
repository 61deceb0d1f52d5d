//! Review-chain configuration handlers. Admin-only writes.

use crate::api::extract::CurrentUser;
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use onestop_review::StageUpsert;
use onestop_types::ReviewStage;
use serde::Deserialize;

/// The ordered review chain for one council module
pub async fn list_stages(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(module): Path<String>,
) -> ApiResult<Json<Vec<ReviewStage>>> {
    let stages = state.review.list_stages(&module).await?;
    Ok(Json(stages))
}

fn default_enabled() -> bool {
    true
}

/// Stage definition request
#[derive(Debug, Deserialize)]
pub struct UpsertStageRequest {
    pub ordinal: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub reviewers: Vec<String>,
}

/// Create or replace a stage in a module's review chain
pub async fn upsert_stage(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((module, name)): Path<(String, String)>,
    Json(request): Json<UpsertStageRequest>,
) -> ApiResult<Json<ReviewStage>> {
    let stage = state
        .review
        .upsert_stage(
            &user,
            StageUpsert {
                module,
                name,
                ordinal: request.ordinal,
                enabled: request.enabled,
                reviewers: request.reviewers,
            },
        )
        .await?;
    Ok(Json(stage))
}
