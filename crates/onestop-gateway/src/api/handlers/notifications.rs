//! Device registration and notification feed handlers

use crate::api::extract::{CurrentUser, WindowParams};
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Query, State},
    Json,
};
use onestop_types::{DevicePlatform, DeviceToken, Notification};
use serde::Deserialize;

/// Device registration request
#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub token: String,
    pub platform: DevicePlatform,
}

/// Register (or refresh) a push token for the caller's device
pub async fn register_device(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<RegisterDeviceRequest>,
) -> ApiResult<Json<DeviceToken>> {
    let device = state
        .notify
        .register_device(&user, &request.token, request.platform)
        .await?;
    Ok(Json(device))
}

/// The caller's notification feed, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<Vec<Notification>>> {
    let notifications = state.notify.notifications_for(&user, params.window()).await?;
    Ok(Json(notifications))
}
