//! Admin upload endpoints
//!
//! Only routed when the upload capability is enabled.

use crate::{ApiError, AppState};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use webgl_host_store::{megabytes, UploadStore};

/// Multipart field holding the uploaded file
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub size: u64,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    #[serde(rename = "sizeInMB")]
    pub size_in_mb: String,
}

/// POST /admin/upload - Store a single multipart `file` field
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let uploads = upload_store(&state)?;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("file field has no filename".to_string()))?;

        // Dropping `pending` on an early return removes the partial file
        let mut pending = uploads.begin(&filename).await?;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            pending.write(&chunk).await?;
        }
        let stored = pending.commit().await?;

        return Ok(Json(UploadResponse {
            success: true,
            filename: stored.filename,
            size: stored.size,
            path: stored.path.display().to_string(),
        }));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

/// GET /admin/files - List the upload volume
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, ApiError> {
    let files = upload_store(&state)?
        .list()
        .await?
        .into_iter()
        .map(|file| FileInfo {
            size_in_mb: format!("{:.2}", megabytes(file.size)),
            filename: file.filename,
            size: file.size,
        })
        .collect();

    Ok(Json(FilesResponse { files }))
}

fn upload_store(state: &AppState) -> Result<&Arc<UploadStore>, ApiError> {
    state
        .uploads
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("upload endpoint disabled".to_string()))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
