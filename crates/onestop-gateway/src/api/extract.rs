//! Request extractors shared by the handlers.
//!
//! `CurrentUser` resolves the `Authorization: Bearer` token to its account
//! through the accounts service, so role checks inside handlers always act
//! on a live session.

use crate::api::state::AppState;
use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use onestop_storage::QueryWindow;
use onestop_types::UserAccount;
use serde::Deserialize;

/// The authenticated account behind the request
pub struct CurrentUser(pub UserAccount);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
        let user = state.accounts.authenticate(token).await?;
        Ok(Self(user))
    }
}

/// Pull the token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Pagination query parameters accepted by every list endpoint
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl WindowParams {
    pub fn window(&self) -> QueryWindow {
        QueryWindow {
            limit: self.limit,
            offset: self.offset,
        }
    }
}
