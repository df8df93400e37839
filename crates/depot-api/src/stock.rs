use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use depot_types::api::{CreateMovementRequest, MovementResponse};
use depot_types::models::MovementKind;

use crate::auth::AppState;
use crate::convert;
use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::{today, with_db};

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub kind: Option<MovementKind>,
}

pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<MovementResponse>>> {
    user.require_staff()?;
    let rows = with_db(&state, move |db| db.list_movements(query.kind.map(|k| k.as_str()))).await?;
    Ok(Json(convert::all(rows, convert::movement)?))
}

pub async fn create_entry(
    state: State<AppState>,
    user: Extension<AuthUser>,
    Json(req): Json<CreateMovementRequest>,
) -> ApiResult<impl IntoResponse> {
    record(state, user, MovementKind::Entry, req).await
}

pub async fn create_exit(
    state: State<AppState>,
    user: Extension<AuthUser>,
    Json(req): Json<CreateMovementRequest>,
) -> ApiResult<impl IntoResponse> {
    record(state, user, MovementKind::Exit, req).await
}

async fn record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    kind: MovementKind,
    req: CreateMovementRequest,
) -> ApiResult<(StatusCode, Json<MovementResponse>)> {
    user.require_staff()?;

    let id = Uuid::new_v4();
    let date = req.date.unwrap_or_else(today);
    let protocol = req.protocol.trim().to_string();

    let movement_id = id.to_string();
    let row = with_db(&state, move |db| {
        db.insert_movement(&movement_id, kind.as_str(), &date.to_string(), &protocol)?;
        db.get_movement(&movement_id)
    })
    .await?
    .ok_or_else(|| anyhow::anyhow!("movement {id} vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(convert::movement(row)?)))
}
