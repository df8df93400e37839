use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use depot_types::api::{StoreRequest, StoreResponse, StoreStopResponse};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::with_db;

#[derive(Debug, Deserialize)]
pub struct StoreQuery {
    pub active: Option<bool>,
}

pub async fn list_stores(
    State(state): State<AppState>,
    Query(query): Query<StoreQuery>,
    Extension(_user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<StoreResponse>>> {
    let rows = with_db(&state, move |db| db.list_stores(query.active)).await?;
    Ok(Json(convert::all(rows, convert::store)?))
}

pub async fn create_store(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<StoreRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_staff()?;
    let req = validate(req)?;

    let id = Uuid::new_v4().to_string();
    let row = with_db(&state, move |db| {
        db.insert_store(&id, &req)?;
        db.get_store(&id)
    })
    .await?
    .ok_or_else(|| anyhow::anyhow!("store vanished after insert"))?;

    info!("{} created store {}", user.username, row.name);
    Ok((StatusCode::CREATED, Json(convert::store(row)?)))
}

/// Replace every editable field of the store.
pub async fn update_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<StoreRequest>,
) -> ApiResult<Json<StoreResponse>> {
    user.require_staff()?;
    let req = validate(req)?;

    let store_id = id.to_string();
    let row = with_db(&state, move |db| {
        if !db.update_store(&store_id, &req)? {
            return Ok(None);
        }
        db.get_store(&store_id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("store not found"))?;

    Ok(Json(convert::store(row)?))
}

/// Stops that visit the caller's own store.
pub async fn my_stops(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<StoreStopResponse>>> {
    if !user.role.is_store() {
        return Err(ApiError::forbidden("store users only"));
    }
    let Some(store_id) = user.store_id else {
        return Ok(Json(Vec::new()));
    };

    let store_id = store_id.to_string();
    let rows = with_db(&state, move |db| db.list_stops_for_store(&store_id)).await?;
    Ok(Json(convert::all(rows, convert::store_stop)?))
}

fn validate(mut req: StoreRequest) -> ApiResult<StoreRequest> {
    req.name = req.name.trim().to_string();
    req.city = req.city.trim().to_string();
    req.address = req.address.trim().to_string();
    if req.name.is_empty() || req.city.is_empty() || req.address.is_empty() {
        return Err(ApiError::bad_request("name, city and address are required"));
    }
    req.complement = req.complement.filter(|c| !c.trim().is_empty());
    Ok(req)
}
