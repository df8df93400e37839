use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use depot_types::api::{ConfirmProtocolRequest, CreateProtocolRequest, ProtocolResponse};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::transfers::generate_number;
use crate::{today, with_db};

pub async fn list_protocols(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<ProtocolResponse>>> {
    user.require_staff()?;
    let rows = with_db(&state, |db| db.list_protocols()).await?;
    Ok(Json(convert::all(rows, convert::protocol)?))
}

pub async fn create_protocol(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateProtocolRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_staff()?;

    let id = Uuid::new_v4().to_string();
    let date = req.date.unwrap_or_else(today);
    let number = generate_number("PRT", date);
    let store_id = req.store_id.map(|s| s.to_string());
    let kind = req.kind.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
    let responsible = req
        .responsible
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let created_by = user.id.to_string();

    let row = with_db(&state, move |db| {
        if let Some(store_id) = store_id.as_deref() {
            if db.get_store(store_id)?.is_none() {
                return Ok(Err(ApiError::not_found("store not found")));
            }
        }
        db.insert_protocol(
            &id,
            &number,
            kind.as_deref(),
            &date.to_string(),
            store_id.as_deref(),
            responsible.as_deref(),
            &created_by,
        )?;
        Ok(Ok(db.get_protocol(&id)?))
    })
    .await??
    .ok_or_else(|| anyhow::anyhow!("protocol vanished after insert"))?;

    info!("{} created protocol {}", user.username, row.number);
    Ok((StatusCode::CREATED, Json(convert::protocol(row)?)))
}

/// Record who received the batch. A protocol is confirmed once.
pub async fn confirm_protocol(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ConfirmProtocolRequest>,
) -> ApiResult<Json<ProtocolResponse>> {
    if !user.role.can_confirm_protocols() {
        return Err(ApiError::forbidden("only couriers can confirm protocols"));
    }
    let confirmed_name = req.confirmed_name.trim().to_string();
    if confirmed_name.is_empty() {
        return Err(ApiError::bad_request("confirmed_name is required"));
    }

    let protocol_id = id.to_string();
    let me = user.id.to_string();
    let row = with_db(&state, move |db| {
        if db.get_protocol(&protocol_id)?.is_none() {
            return Ok(Err(ApiError::not_found("protocol not found")));
        }
        if !db.confirm_protocol(&protocol_id, &confirmed_name, &me)? {
            return Ok(Err(ApiError::conflict("protocol already finalized")));
        }
        Ok(Ok(db.get_protocol(&protocol_id)?))
    })
    .await??
    .ok_or_else(|| ApiError::not_found("protocol not found"))?;

    info!("{} confirmed protocol {}", user.username, row.number);
    Ok(Json(convert::protocol(row)?))
}
