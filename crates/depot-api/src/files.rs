use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use depot_db::models::FileRow;
use depot_db::now_timestamp;
use depot_types::api::UploadResponse;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::with_db;

/// 20 MiB upload limit for chat attachments
pub const MAX_FILE_SIZE: usize = 20 * 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// POST /files?filename= -- raw bytes in the body, stored under a fresh id.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    if bytes.is_empty() {
        return Err(ApiError::bad_request("empty upload"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }

    let file_id = Uuid::new_v4();
    let id = file_id.to_string();
    let sha256 = state.storage.write(&id, &bytes).await?;

    let row = FileRow {
        id: id.clone(),
        uploader_id: user.id.to_string(),
        filename: query
            .filename
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| "upload".to_string()),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
        size: bytes.len() as i64,
        sha256: sha256.clone(),
        created_at: now_timestamp(),
    };

    if let Err(e) = with_db(&state, move |db| db.insert_file(&row)).await {
        if let Err(cleanup) = state.storage.remove(&id).await {
            warn!("Failed to remove orphaned upload {}: {}", id, cleanup);
        }
        return Err(e);
    }

    info!("{} uploaded file {} ({} bytes)", user.username, file_id, bytes.len());

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_id,
            size: bytes.len() as u64,
            sha256,
        }),
    ))
}

/// GET /files/{id} -- the uploader and the participants of any message
/// carrying the file may download it.
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let id = file_id.to_string();
    let me = user.id.to_string();
    let (file, allowed) = with_db(&state, move |db| {
        let Some(file) = db.get_file(&id)? else {
            return Ok((None, false));
        };
        let allowed = file.uploader_id == me || db.file_shared_with(&id, &me)?;
        Ok((Some(file), allowed))
    })
    .await?;

    let file = file.ok_or_else(|| ApiError::not_found("file not found"))?;
    if !allowed {
        return Err(ApiError::forbidden("you cannot access this file"));
    }

    let bytes = state.storage.read(&file.id).await.map_err(|e| {
        warn!("File {} missing from disk: {}", file.id, e);
        ApiError::not_found("file not found")
    })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.filename.replace(['"', '\\', '\r', '\n'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
