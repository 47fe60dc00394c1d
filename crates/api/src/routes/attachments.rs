//! Attachment routes.
//!
//! Clients request a signed upload URL, PUT the file bytes straight to
//! object storage, and read attachments back with freshly derived URLs.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::AuthUser};
use ferry_core::attachment::{
    AttachmentStatus, EntityType, IssueUploadInput, RegisterMetadataInput, ResolvedAttachment,
    validate_entity_type,
};

/// Creates the attachment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/attachments/upload-url", post(issue_upload_url))
        .route("/attachments", post(register_metadata))
        .route(
            "/attachments/entities/{entity_type}/{entity_id}",
            get(list_by_entity),
        )
        .route(
            "/attachments/{attachment_id}",
            get(get_attachment).delete(delete_attachment),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a signed upload URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUploadRequest {
    /// Entity type token (case-insensitive).
    pub entity_type: String,
    /// Parent scope used in the storage key.
    pub parent_id: Uuid,
    /// Original filename.
    pub file_name: String,
    /// File size in bytes.
    pub file_size: i64,
    /// MIME type of the file.
    pub content_type: String,
}

/// Response for a signed upload URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUploadResponse {
    /// Generated attachment ID.
    pub attachment_id: Uuid,
    /// Presigned upload URL.
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    /// HTTP method to use (PUT).
    pub upload_method: String,
    /// Headers the upload must carry.
    pub upload_headers: HashMap<String, String>,
    /// Storage key of the object.
    pub storage_key: String,
    /// Validity of the upload URL in seconds.
    pub expires_in_seconds: u64,
}

/// Request body for registering an already uploaded object.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMetadataRequest {
    /// Entity type token (case-insensitive).
    pub entity_type: String,
    /// Storage key from a prior upload authorization.
    pub storage_key: String,
    /// Original filename.
    pub file_name: String,
    /// File size in bytes.
    pub file_size: i64,
    /// MIME type.
    pub content_type: String,
}

/// Public attachment shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentResponse {
    /// Attachment ID.
    pub id: Uuid,
    /// Entity type.
    pub entity_type: EntityType,
    /// Owning entity, absent while TEMP.
    pub entity_id: Option<Uuid>,
    /// Lifecycle status.
    pub status: AttachmentStatus,
    /// Original filename.
    pub file_name: String,
    /// Readable URL derived from the storage key.
    pub url: String,
    /// File size in bytes.
    pub file_size: i64,
    /// MIME type.
    pub content_type: String,
    /// Uploader ID.
    pub uploaded_by: Uuid,
    /// Creation timestamp (ISO 8601).
    pub uploaded_at: String,
    /// TEMP expiry (ISO 8601).
    pub expires_at: Option<String>,
}

impl From<ResolvedAttachment> for AttachmentResponse {
    fn from(resolved: ResolvedAttachment) -> Self {
        let a = resolved.attachment;
        Self {
            id: a.id,
            entity_type: a.entity_type,
            entity_id: a.entity_id,
            status: a.status,
            file_name: a.file_name,
            url: resolved.url,
            file_size: a.file_size,
            content_type: a.content_type,
            uploaded_by: a.uploaded_by,
            uploaded_at: a.created_at.to_rfc3339(),
            expires_at: a.expires_at.map(|t| t.to_rfc3339()),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/attachments/upload-url`
/// Validate the upload and issue a signed PUT URL.
async fn issue_upload_url(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<IssueUploadRequest>, JsonRejection>,
) -> Result<Json<IssueUploadResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::validation(e.body_text()))?;

    let result = state
        .attachments
        .issue_upload(IssueUploadInput {
            entity_type: payload.entity_type,
            parent_id: payload.parent_id,
            file_name: payload.file_name,
            file_size: payload.file_size,
            content_type: payload.content_type,
            requested_by: auth.user_id(),
        })
        .await?;

    info!(
        user_id = %auth.user_id(),
        attachment_id = %result.attachment_id,
        "upload url requested"
    );

    Ok(Json(IssueUploadResponse {
        attachment_id: result.attachment_id,
        upload_url: result.upload_url,
        upload_method: result.upload_method,
        upload_headers: result.upload_headers,
        storage_key: result.storage_key,
        expires_in_seconds: result.expires_in_seconds,
    }))
}

/// POST `/attachments`
/// Register metadata for an object the client already uploaded.
async fn register_metadata(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<RegisterMetadataRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AttachmentResponse>), ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::validation(e.body_text()))?;

    let resolved = state
        .attachments
        .register_metadata(RegisterMetadataInput {
            entity_type: payload.entity_type,
            storage_key: payload.storage_key,
            file_name: payload.file_name,
            file_size: payload.file_size,
            content_type: payload.content_type,
            requested_by: auth.user_id(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(resolved.into())))
}

/// GET `/attachments/entities/{entity_type}/{entity_id}`
/// List attachments bound to an entity.
async fn list_by_entity(
    State(state): State<AppState>,
    _auth: AuthUser,
    path: Result<Path<(String, Uuid)>, PathRejection>,
) -> Result<Json<Vec<AttachmentResponse>>, ApiError> {
    let Path((entity_type, entity_id)) = path.map_err(|e| ApiError::validation(e.body_text()))?;
    let entity_type = validate_entity_type(&entity_type)?;

    let attachments = state
        .attachments
        .list_by_entity(entity_type, entity_id)
        .await?;

    Ok(Json(attachments.into_iter().map(Into::into).collect()))
}

/// GET `/attachments/{attachment_id}`
async fn get_attachment(
    State(state): State<AppState>,
    _auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AttachmentResponse>, ApiError> {
    let Path(attachment_id) = path.map_err(|e| ApiError::validation(e.body_text()))?;

    let resolved = state.attachments.get_by_id(attachment_id).await?;
    Ok(Json(resolved.into()))
}

/// DELETE `/attachments/{attachment_id}`
/// Only the uploader may delete. Repeating the call is harmless.
async fn delete_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(attachment_id) = path.map_err(|e| ApiError::validation(e.body_text()))?;

    state
        .attachments
        .delete(attachment_id, auth.user_id())
        .await?;

    info!(
        user_id = %auth.user_id(),
        attachment_id = %attachment_id,
        "attachment deleted"
    );

    Ok(Json(json!({ "deleted": true })))
}
