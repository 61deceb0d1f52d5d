//! Document upload and verification handlers
//!
//! Uploads arrive as a raw body; the gateway hashes the bytes before they
//! move on to the object store, so the stored checksum is computed at the
//! trust boundary rather than taken from the client.

use crate::api::extract::{CurrentUser, WindowParams};
use crate::api::state::AppState;
use crate::error::ApiResult;
use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use onestop_documents::NewDocument;
use onestop_types::{DocumentId, DocumentRecord, ProjectId};
use serde::Deserialize;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Upload query parameters
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub file_name: String,
}

/// Register an upload: checksum the bytes, record the metadata.
pub async fn upload_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<DocumentRecord>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();

    let checksum = blake3::hash(&body).to_hex().to_string();
    let storage_key = format!("uploads/{}/{}", uuid::Uuid::new_v4(), params.file_name);

    let document = state
        .documents
        .register_upload(
            &user,
            NewDocument {
                file_name: params.file_name,
                content_type,
                size_bytes: body.len() as u64,
                checksum,
                storage_key,
            },
        )
        .await?;

    Ok(Json(document))
}

/// Fetch one document. Owner or staff.
pub async fn get_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentRecord>> {
    let document = state
        .documents
        .get_document(&user, &DocumentId::new(id))
        .await?;
    Ok(Json(document))
}

/// List the caller's uploads
pub async fn list_my_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<Vec<DocumentRecord>>> {
    let documents = state
        .documents
        .documents_for_owner(&user.id, params.window())
        .await?;
    Ok(Json(documents))
}

/// List a project's attached documents. Members and staff.
pub async fn list_project_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<DocumentRecord>>> {
    let documents = state
        .documents
        .documents_for_project(&user, &ProjectId::new(id))
        .await?;
    Ok(Json(documents))
}

/// Attach request
#[derive(Debug, Deserialize)]
pub struct AttachDocumentRequest {
    pub project_id: String,
}

/// Attach a document to a draft project
pub async fn attach_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<AttachDocumentRequest>,
) -> ApiResult<Json<DocumentRecord>> {
    let document = state
        .documents
        .attach_to_project(
            &user,
            &DocumentId::new(id),
            &ProjectId::new(request.project_id),
        )
        .await?;
    Ok(Json(document))
}

/// Mark a pending document verified. Officers only.
pub async fn verify_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentRecord>> {
    let document = state
        .documents
        .verify_document(&user, &DocumentId::new(id))
        .await?;
    Ok(Json(document))
}

/// Rejection request
#[derive(Debug, Deserialize)]
pub struct RejectDocumentRequest {
    pub reason: String,
}

/// Mark a pending document rejected with a reason. Officers only.
pub async fn reject_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<RejectDocumentRequest>,
) -> ApiResult<Json<DocumentRecord>> {
    let document = state
        .documents
        .reject_document(&user, &DocumentId::new(id), &request.reason)
        .await?;
    Ok(Json(document))
}
