use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use depot_db::models::{NewNotification, NewRoute};
use depot_types::api::{
    AddStopRequest, CreateRouteRequest, CreatedResponse, ReorderStopsRequest, RouteDetail,
    RouteSummary, StopResponse, TransferResponse,
};
use depot_types::events::GatewayEvent;
use depot_types::models::{Role, RouteStatus, StopProgress, TransferStatus};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::{today, with_db};

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub date: Option<NaiveDate>,
}

/// Routes of one day (today by default). Couriers only see their own.
pub async fn list_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<RouteSummary>>> {
    if user.role.is_store() {
        return Err(ApiError::forbidden("store users cannot view routes"));
    }

    let date = query.date.unwrap_or_else(today).to_string();
    let courier = user.role.is_courier().then(|| user.id.to_string());
    let rows = with_db(&state, move |db| db.list_routes(&date, courier.as_deref())).await?;
    Ok(Json(convert::all(rows, convert::route_summary)?))
}

/// Create a route with its stops and tell the courier about it.
pub async fn create_route(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateRouteRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_logistics()?;

    let route_id = Uuid::new_v4();
    let date = req.date.unwrap_or_else(today);
    let stop_count = req.store_ids.len();

    let route = NewRoute {
        id: route_id.to_string(),
        name: req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        date: date.to_string(),
        courier_id: Some(req.courier_id.to_string()),
        status: RouteStatus::Open.as_str().to_string(),
    };
    let notification = NewNotification {
        id: Uuid::new_v4().to_string(),
        user_id: req.courier_id.to_string(),
        title: "New route assigned".to_string(),
        body: format!(
            "You received a new route with {} stops for {}.",
            stop_count,
            convert::day_month(date)
        ),
    };
    let store_ids: Vec<String> = req.store_ids.iter().map(Uuid::to_string).collect();

    let pushed = with_db(&state, move |db| {
        let courier = db.get_user_by_id(&notification.user_id)?;
        if !courier.is_some_and(|c| c.role == Role::Courier.as_str()) {
            return Ok(Err(ApiError::bad_request("courier_id must name a courier")));
        }
        for store_id in &store_ids {
            if db.get_store(store_id)?.is_none() {
                return Ok(Err(ApiError::not_found(format!("store {store_id} not found"))));
            }
        }
        db.create_route(&route, &store_ids, Some(&notification))?;
        Ok(Ok(db.get_notification(&notification.id)?))
    })
    .await??;

    info!("{} created route {} with {} stops", user.username, route_id, stop_count);

    if let Some(row) = pushed {
        state
            .dispatcher
            .send_to_user(req.courier_id, GatewayEvent::NotificationCreate(convert::notification(row)?))
            .await;
    }

    Ok((StatusCode::CREATED, Json(CreatedResponse { id: route_id })))
}

pub async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<RouteDetail>> {
    if user.role.is_store() {
        return Err(ApiError::forbidden("store users cannot view routes"));
    }

    let detail = load_route_detail(&state, id)
        .await?
        .ok_or_else(|| ApiError::not_found("route not found"))?;

    if user.role.is_courier() && detail.courier_id != Some(user.id) {
        return Err(ApiError::forbidden("you cannot access this route"));
    }

    Ok(Json(detail))
}

/// Append a stop after the last one.
pub async fn add_stop(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AddStopRequest>,
) -> ApiResult<impl IntoResponse> {
    user.require_logistics()?;

    let route = route_id.to_string();
    let store = req.store_id.to_string();
    let stop_id = with_db(&state, move |db| {
        if db.get_route(&route)?.is_none() {
            return Ok(Err(ApiError::not_found("route not found")));
        }
        if db.get_store(&store)?.is_none() {
            return Ok(Err(ApiError::not_found("store not found")));
        }
        Ok(Ok(db.add_stop(&route, &store)?))
    })
    .await??;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: convert::uuid(&stop_id)?,
        }),
    ))
}

/// Renumber the route's stops following `ids`.
pub async fn reorder_stops(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ReorderStopsRequest>,
) -> ApiResult<StatusCode> {
    if req.ids.is_empty() {
        return Err(ApiError::bad_request("ids must not be empty"));
    }
    let unique: HashSet<Uuid> = req.ids.iter().copied().collect();
    if unique.len() != req.ids.len() {
        return Err(ApiError::bad_request("ids must be unique"));
    }

    let route = route_id.to_string();
    let courier = with_db(&state, move |db| db.get_route(&route))
        .await?
        .ok_or_else(|| ApiError::not_found("route not found"))?
        .courier_id;
    if !user.is_logistics_or(convert::opt_uuid(courier.as_deref())?) {
        return Err(ApiError::forbidden("you cannot reorder this route"));
    }

    let route = route_id.to_string();
    let ids: Vec<String> = req.ids.iter().map(Uuid::to_string).collect();
    let reordered = with_db(&state, move |db| db.reorder_stops(&route, &ids)).await?;
    if !reordered {
        return Err(ApiError::bad_request("ids must be exactly the stops of this route"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Mark a stop collected.
pub async fn collect_stop(
    State(state): State<AppState>,
    Path(stop_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    let stop = stop_id.to_string();
    let courier = with_db(&state, move |db| {
        let Some(stop) = db.get_stop(&stop)? else {
            return Ok(None);
        };
        Ok(db.get_route(&stop.route_id)?.map(|r| r.courier_id))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("stop not found"))?;

    if !user.is_logistics_or(convert::opt_uuid(courier.as_deref())?) {
        return Err(ApiError::forbidden("you cannot change this stop"));
    }

    let stop = stop_id.to_string();
    with_db(&state, move |db| db.collect_stop(&stop)).await?;

    info!("{} collected stop {}", user.username, stop_id);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn load_route_detail(state: &AppState, id: Uuid) -> ApiResult<Option<RouteDetail>> {
    let route_id = id.to_string();
    let loaded = with_db(state, move |db| {
        let Some(route) = db.get_route(&route_id)? else {
            return Ok(None);
        };
        let stops = db.list_stops(&route_id)?;
        let transfers = db.list_route_transfers(&route_id)?;
        Ok(Some((route, stops, transfers)))
    })
    .await?;

    let Some((route, stops, transfers)) = loaded else {
        return Ok(None);
    };

    let summary = convert::route_summary(route)?;
    let transfers = convert::all(transfers, convert::transfer)?;

    let mut stop_responses = Vec::with_capacity(stops.len());
    for stop in stops {
        let store_id = convert::uuid(&stop.store_id)?;
        let (progress, to_collect, to_deliver) = stop_progress(store_id, &transfers);
        stop_responses.push(StopResponse {
            id: convert::uuid(&stop.id)?,
            route_id: convert::uuid(&stop.route_id)?,
            status: stop.status.parse().map_err(anyhow::Error::from)?,
            collected_at: convert::opt_timestamp(stop.collected_at.as_deref())?,
            store_id,
            store_name: stop.store_name,
            position: stop.position,
            visited: stop.visited,
            notes: stop.notes,
            progress,
            transfer_to_collect: to_collect,
            transfer_to_deliver: to_deliver,
        });
    }

    Ok(Some(RouteDetail {
        id: summary.id,
        name: summary.name,
        date: summary.date,
        courier_id: summary.courier_id,
        courier_username: summary.courier_username,
        status: summary.status,
        stops: stop_responses,
        transfer_ids: transfers.iter().map(|t| t.id).collect(),
    }))
}

/// Progress of a stop from the transfers on its route, plus the pending
/// transfer to collect there and the in-transit one to deliver there.
fn stop_progress(
    store_id: Uuid,
    transfers: &[TransferResponse],
) -> (StopProgress, Option<Uuid>, Option<Uuid>) {
    let leaving = |t: &&TransferResponse| t.origin_store_id == Some(store_id);
    let arriving = |t: &&TransferResponse| t.destination_store_id == Some(store_id);

    let to_collect = transfers
        .iter()
        .filter(leaving)
        .find(|t| t.status == TransferStatus::Pending)
        .map(|t| t.id);
    let to_deliver = transfers
        .iter()
        .filter(arriving)
        .find(|t| t.status == TransferStatus::InTransit)
        .map(|t| t.id);

    let progress = if transfers
        .iter()
        .filter(leaving)
        .any(|t| t.status != TransferStatus::Pending)
    {
        StopProgress::Collected
    } else if transfers
        .iter()
        .filter(arriving)
        .any(|t| t.status == TransferStatus::Confirmed)
    {
        StopProgress::Delivered
    } else {
        StopProgress::Pending
    };

    (progress, to_collect, to_deliver)
}
