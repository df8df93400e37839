use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Local;
use rand::Rng;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use depot_db::models::{NewRoute, NewTransfer, RouteBuild, TransferFilter};
use depot_types::api::{
    BuildRouteRequest, CreateTransferRequest, CreatedResponse, PickedUpByRequest, TransferResponse,
};
use depot_types::models::{LoadSize, RouteStatus, TransferKind, TransferStatus};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::{today, with_db};

const NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub load_size: Option<LoadSize>,
    pub status: Option<TransferStatus>,
}

/// Transfers not yet on a route, newest first.
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<TransferQuery>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<TransferResponse>>> {
    // Couriers only carry small loads
    let load_size = if user.role.is_courier() {
        Some(LoadSize::Small)
    } else {
        query.load_size
    };
    let store_id = if user.role.is_store() {
        match user.store_id {
            Some(id) => Some(id.to_string()),
            None => return Ok(Json(Vec::new())),
        }
    } else {
        None
    };
    let status = query.status;

    let rows = with_db(&state, move |db| {
        db.list_unrouted_transfers(&TransferFilter {
            load_size: load_size.map(|l| l.as_str()),
            status: status.map(|s| s.as_str()),
            store_id: store_id.as_deref(),
        })
    })
    .await?;

    Ok(Json(convert::all(rows, convert::transfer)?))
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(mut req): Json<CreateTransferRequest>,
) -> ApiResult<impl IntoResponse> {
    if user.role.is_courier() {
        return Err(ApiError::forbidden("couriers cannot create transfers"));
    }
    if user.role.is_store() {
        let own = user
            .store_id
            .ok_or_else(|| ApiError::forbidden("your account is not linked to a store"))?;
        req.origin_store_id = Some(own);
    }
    validate_transfer(&req)?;

    let id = Uuid::new_v4();
    let date = req.date.unwrap_or_else(today);
    let new_transfer = NewTransfer {
        id: id.to_string(),
        kind: req.kind.as_str().to_string(),
        origin_store_id: req.origin_store_id.map(|s| s.to_string()),
        destination_store_id: req.destination_store_id.map(|s| s.to_string()),
        product_name: trimmed(req.product_name),
        brand: trimmed(req.brand),
        quantity: req.quantity,
        supplier: trimmed(req.supplier),
        responsible: trimmed(req.responsible),
        picked_up_by: trimmed(req.picked_up_by),
        document_number: trimmed(req.document_number),
        notes: trimmed(req.notes),
        transfer_number: trimmed(req.transfer_number)
            .unwrap_or_else(|| generate_number("TRF", date)),
        load_size: req.load_size.as_str().to_string(),
        courier_id: req.courier_id.map(|c| c.to_string()),
        date: date.to_string(),
        created_by: user.id.to_string(),
    };

    let row = with_db(&state, move |db| {
        let stores = [&new_transfer.origin_store_id, &new_transfer.destination_store_id];
        for store_id in stores.into_iter().flatten() {
            if db.get_store(store_id)?.is_none() {
                return Ok(Err(ApiError::not_found(format!("store {store_id} not found"))));
            }
        }
        if let Some(courier_id) = &new_transfer.courier_id {
            if db.get_user_by_id(courier_id)?.is_none() {
                return Ok(Err(ApiError::not_found("courier not found")));
            }
        }
        db.insert_transfer(&new_transfer)?;
        Ok(Ok(db.get_transfer(&new_transfer.id)?))
    })
    .await??
    .ok_or_else(|| anyhow::anyhow!("transfer {id} vanished after insert"))?;

    let created = convert::transfer(row)?;
    info!("{} created transfer {}", user.username, created.transfer_number);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<TransferResponse>> {
    let transfer = load_transfer(&state, id).await?;
    if user.role.is_store() && !involves_store(&transfer, user.store_id) {
        return Err(ApiError::forbidden("you cannot access this transfer"));
    }
    Ok(Json(transfer))
}

pub async fn update_picked_up_by(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PickedUpByRequest>,
) -> ApiResult<Json<TransferResponse>> {
    let transfer = load_transfer(&state, id).await?;
    if !user.is_logistics_or(transfer.courier_id) {
        return Err(ApiError::forbidden("you cannot change this transfer"));
    }

    let transfer_id = id.to_string();
    let name = trimmed(req.picked_up_by);
    let updated = with_db(&state, move |db| db.set_picked_up_by(&transfer_id, name.as_deref())).await?;
    if !updated {
        return Err(ApiError::conflict("transfer already confirmed"));
    }

    Ok(Json(load_transfer(&state, id).await?))
}

/// Mark a transfer confirmed. Confirming twice is a no-op.
pub async fn confirm_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<TransferResponse>> {
    let transfer = load_transfer(&state, id).await?;
    if !user.is_logistics_or(transfer.courier_id) {
        return Err(ApiError::forbidden("you cannot confirm this transfer"));
    }
    if transfer.status.is_final() {
        return Ok(Json(transfer));
    }

    let transfer_id = id.to_string();
    let me = user.id.to_string();
    if with_db(&state, move |db| db.confirm_transfer(&transfer_id, &me)).await? {
        info!("{} confirmed transfer {}", user.username, transfer.transfer_number);
    }

    Ok(Json(load_transfer(&state, id).await?))
}

pub async fn delete_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    user.require_staff()?;

    let transfer_id = id.to_string();
    if !with_db(&state, move |db| db.delete_transfer(&transfer_id)).await? {
        return Err(ApiError::not_found("transfer not found"));
    }

    info!("{} deleted transfer {}", user.username, id);
    Ok(StatusCode::NO_CONTENT)
}

/// pending -> in_transit. The collecting courier becomes the assigned one.
pub async fn pick_up(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<TransferResponse>> {
    if !(user.role.is_courier() || user.role.is_staff()) {
        return Err(ApiError::forbidden("only couriers can pick up loads"));
    }

    let transfer = load_transfer(&state, id).await?;
    if !transfer.status.can_pick_up() {
        return Err(ApiError::conflict("the load is not waiting for pickup"));
    }

    let transfer_id = id.to_string();
    let courier = user.role.is_courier().then(|| user.id.to_string());
    let picked = with_db(&state, move |db| db.pick_up_transfer(&transfer_id, courier.as_deref())).await?;
    if !picked {
        return Err(ApiError::conflict("the load is not waiting for pickup"));
    }

    info!("{} picked up transfer {}", user.username, transfer.transfer_number);
    Ok(Json(load_transfer(&state, id).await?))
}

/// in_transit -> confirmed, on delivery at the destination.
pub async fn receive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<TransferResponse>> {
    let transfer = load_transfer(&state, id).await?;

    let at_destination = user.role.is_store()
        && user.store_id.is_some()
        && transfer.destination_store_id == user.store_id;
    if !(user.is_logistics_or(transfer.courier_id) || at_destination) {
        return Err(ApiError::forbidden("you cannot receive this transfer"));
    }
    if !transfer.status.can_receive() {
        return Err(ApiError::conflict("the load must be picked up before delivery"));
    }

    let transfer_id = id.to_string();
    let me = user.id.to_string();
    let received = with_db(&state, move |db| db.receive_transfer(&transfer_id, &me)).await?;
    if !received {
        return Err(ApiError::conflict("the load must be picked up before delivery"));
    }

    info!("{} received transfer {}", user.username, transfer.transfer_number);
    Ok(Json(load_transfer(&state, id).await?))
}

/// Put the selected transfers on a new route driven by the caller.
pub async fn build_courier_route(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<BuildRouteRequest>,
) -> ApiResult<impl IntoResponse> {
    if !(user.role.is_courier() || user.role.manages_logistics()) {
        return Err(ApiError::forbidden("not allowed for your role"));
    }
    if req.transfer_ids.is_empty() {
        return Err(ApiError::bad_request("select at least one transfer"));
    }

    let mut seen = HashSet::new();
    let transfer_ids: Vec<String> = req
        .transfer_ids
        .iter()
        .filter(|id| seen.insert(**id))
        .map(Uuid::to_string)
        .collect();

    let now = Local::now();
    let route_id = Uuid::new_v4();
    let route = NewRoute {
        id: route_id.to_string(),
        name: Some(format!("Route {}", now.format("%d/%m %H:%M"))),
        date: now.date_naive().to_string(),
        courier_id: Some(user.id.to_string()),
        status: RouteStatus::EnRoute.as_str().to_string(),
    };

    let outcome = with_db(&state, move |db| db.build_route_from_transfers(&route, &transfer_ids)).await?;
    match outcome {
        RouteBuild::Created { stops } => {
            info!("{} built route {} with {} stops", user.username, route_id, stops);
            Ok((StatusCode::CREATED, Json(CreatedResponse { id: route_id })))
        }
        RouteBuild::MissingTransfer(id) => Err(ApiError::not_found(format!("transfer {id} not found"))),
        RouteBuild::AlreadyRouted(id) => {
            Err(ApiError::conflict(format!("transfer {id} is already on a route")))
        }
    }
}

async fn load_transfer(state: &AppState, id: Uuid) -> ApiResult<TransferResponse> {
    let transfer_id = id.to_string();
    let row = with_db(state, move |db| db.get_transfer(&transfer_id))
        .await?
        .ok_or_else(|| ApiError::not_found("transfer not found"))?;
    Ok(convert::transfer(row)?)
}

fn involves_store(transfer: &TransferResponse, store_id: Option<Uuid>) -> bool {
    store_id.is_some()
        && (transfer.origin_store_id == store_id || transfer.destination_store_id == store_id)
}

fn validate_transfer(req: &CreateTransferRequest) -> ApiResult<()> {
    match req.kind {
        TransferKind::Entry if req.destination_store_id.is_none() => {
            return Err(ApiError::bad_request("an entry needs a destination store"));
        }
        TransferKind::Exit if req.origin_store_id.is_none() => {
            return Err(ApiError::bad_request("an exit needs an origin store"));
        }
        _ => {}
    }
    if req.origin_store_id.is_some() && req.origin_store_id == req.destination_store_id {
        return Err(ApiError::bad_request("origin and destination must differ"));
    }
    if req.quantity < 0 {
        return Err(ApiError::bad_request("quantity cannot be negative"));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `{prefix}-YYYYMMDD-XXXXXX` with an unambiguous uppercase suffix.
pub(crate) fn generate_number(prefix: &str, date: chrono::NaiveDate) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| NUMBER_ALPHABET[rng.random_range(0..NUMBER_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}-{}-{suffix}", date.format("%Y%m%d"))
}
