//! Registration, login, and OTP handlers

use crate::api::extract::{bearer_token, CurrentUser};
use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use axum::{extract::State, Json};
use onestop_accounts::NewUser;
use onestop_types::{PlatformRole, UserAccount};
use serde::{Deserialize, Serialize};

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub ic_number: String,
    pub password: String,
}

impl RegisterRequest {
    fn into_new_user(self) -> NewUser {
        NewUser {
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            ic_number: self.ic_number,
            password: self.password,
        }
    }
}

/// Register a citizen or business account. The phone stays unverified
/// until an OTP passes, and login is refused until then.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<UserAccount>> {
    let user = state.accounts.register_user(request.into_new_user()).await?;
    Ok(Json(user))
}

/// Staff registration request
#[derive(Debug, Deserialize)]
pub struct RegisterOfficerRequest {
    #[serde(flatten)]
    pub user: RegisterRequest,
    pub role: PlatformRole,
}

/// Register an officer or admin account. Admin only.
pub async fn register_officer(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(request): Json<RegisterOfficerRequest>,
) -> ApiResult<Json<UserAccount>> {
    let user = state
        .accounts
        .register_officer(&actor, request.user.into_new_user(), request.role)
        .await?;
    Ok(Json(user))
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub user: UserAccount,
}

/// Exchange email and password for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let session = state
        .accounts
        .login(&request.email, &request.password)
        .await?;
    let user = state.accounts.get_user(&session.user_id).await?;

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

/// Logout response
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// Delete the presented session
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<LogoutResponse>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
    state.accounts.logout(token).await?;
    Ok(Json(LogoutResponse { logged_out: true }))
}

/// OTP request
#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub phone: String,
}

/// OTP request response
#[derive(Debug, Serialize)]
pub struct OtpRequestedResponse {
    pub sent: bool,
}

/// Send a verification code to the phone over WhatsApp
pub async fn request_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpRequest>,
) -> ApiResult<Json<OtpRequestedResponse>> {
    state.otp.request_otp(&request.phone).await?;
    Ok(Json(OtpRequestedResponse { sent: true }))
}

/// OTP verification request
#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: String,
    pub code: String,
}

/// OTP verification response
#[derive(Debug, Serialize)]
pub struct OtpVerifiedResponse {
    pub verified: bool,
    /// Whether an account held the phone and was marked verified
    pub account_updated: bool,
}

/// Check a verification code; a match marks the owning account's phone
/// verified so login opens up.
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpVerifyRequest>,
) -> ApiResult<Json<OtpVerifiedResponse>> {
    state.otp.verify_otp(&request.phone, &request.code).await?;
    let account = state.accounts.confirm_phone(&request.phone).await?;

    Ok(Json(OtpVerifiedResponse {
        verified: true,
        account_updated: account.is_some(),
    }))
}
