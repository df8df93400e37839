use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use depot_types::api::NotificationResponse;

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::with_db;

/// My notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let me = user.id.to_string();
    let rows = with_db(&state, move |db| db.list_notifications(&me)).await?;
    Ok(Json(convert::all(rows, convert::notification)?))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    let notification_id = id.to_string();
    let me = user.id.to_string();
    let marked = with_db(&state, move |db| db.mark_notification_read(&notification_id, &me)).await?;
    if !marked {
        return Err(ApiError::not_found("notification not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
