//! Health, status, and daemon lifecycle handlers

use crate::api::extract::CurrentUser;
use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, Json};
use onestop_types::PlatformRole;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    Json(DaemonStatusResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
    })
}

/// Shutdown response
#[derive(Debug, Serialize)]
pub struct ShutdownResponse {
    pub shutting_down: bool,
}

/// Ask the daemon to drain and exit. Admin only.
pub async fn shutdown(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<ShutdownResponse>> {
    if user.role != PlatformRole::Admin {
        return Err(ApiError::Forbidden(
            "only admins may stop the daemon".to_string(),
        ));
    }

    tracing::warn!(user_id = %user.id, "shutdown requested over the API");
    state
        .shutdown_tx
        .send(true)
        .map_err(|_| ApiError::Internal("shutdown channel closed".to_string()))?;

    Ok(Json(ShutdownResponse { shutting_down: true }))
}
