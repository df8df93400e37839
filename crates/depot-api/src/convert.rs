//! Row to response conversions. Database rows keep ids, times and enums as
//! text; parsing them here turns a corrupt row into an internal error rather
//! than a silently wrong payload.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use uuid::Uuid;

use depot_db::models::{
    ContactRow, MessageRow, MovementRow, NotificationRow, ProtocolRow, RouteRow, StoreRow,
    StoreStopRow, TransferRow, UserRow,
};
use depot_types::api::{
    ContactResponse, MessageResponse, MovementResponse, NotificationResponse, ProtocolResponse,
    RouteSummary, StoreResponse, StoreStopResponse, TransferResponse, UserResponse,
};

pub fn uuid(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("invalid uuid in database: {s}"))
}

pub fn opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
    s.map(uuid).transpose()
}

pub fn timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp in database: {s}"))?
        .with_timezone(&Utc))
}

pub fn opt_timestamp(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    s.map(timestamp).transpose()
}

pub fn date(s: &str) -> Result<NaiveDate> {
    s.parse().with_context(|| format!("invalid date in database: {s}"))
}

/// `dd/mm`, as shown to couriers.
pub fn day_month(date: NaiveDate) -> String {
    date.format("%d/%m").to_string()
}

pub fn user(row: UserRow) -> Result<UserResponse> {
    Ok(UserResponse {
        id: uuid(&row.id)?,
        role: row.role.parse()?,
        active: row.is_active,
        store_id: opt_uuid(row.store_id.as_deref())?,
        created_at: timestamp(&row.created_at)?,
        username: row.username,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    })
}

pub fn message(row: MessageRow) -> Result<MessageResponse> {
    let created_at = timestamp(&row.created_at)?;
    Ok(MessageResponse {
        id: uuid(&row.id)?,
        sender_id: uuid(&row.sender_id)?,
        recipient_id: uuid(&row.recipient_id)?,
        attachment_url: row.attachment_id.map(|id| format!("/files/{id}")),
        time: created_at.with_timezone(&Local).format("%H:%M").to_string(),
        created_at,
        body: row.body,
        sender_username: row.sender_username,
        read: row.read,
        edited: row.edited,
    })
}

pub fn contact(row: ContactRow) -> Result<ContactResponse> {
    Ok(ContactResponse {
        user_id: uuid(&row.user_id)?,
        last_interaction: opt_timestamp(row.last_interaction.as_deref())?,
        username: row.username,
        unread: row.unread,
    })
}

pub fn store(row: StoreRow) -> Result<StoreResponse> {
    Ok(StoreResponse {
        id: uuid(&row.id)?,
        user_id: opt_uuid(row.user_id.as_deref())?,
        name: row.name,
        city: row.city,
        state: row.state,
        postal_code: row.postal_code,
        district: row.district,
        number: row.number,
        complement: row.complement,
        address: row.address,
        latitude: row.latitude,
        longitude: row.longitude,
        active: row.active,
    })
}

pub fn route_summary(row: RouteRow) -> Result<RouteSummary> {
    Ok(RouteSummary {
        id: uuid(&row.id)?,
        date: date(&row.date)?,
        courier_id: opt_uuid(row.courier_id.as_deref())?,
        status: row.status.parse()?,
        name: row.name,
        courier_username: row.courier_username,
        total_stops: row.total_stops,
        collected_stops: row.collected_stops,
    })
}

pub fn store_stop(row: StoreStopRow) -> Result<StoreStopResponse> {
    Ok(StoreStopResponse {
        id: uuid(&row.id)?,
        route_id: uuid(&row.route_id)?,
        route_date: date(&row.route_date)?,
        route_status: row.route_status.parse()?,
        position: row.position,
        status: row.status.parse()?,
        collected_at: opt_timestamp(row.collected_at.as_deref())?,
    })
}

pub fn transfer(row: TransferRow) -> Result<TransferResponse> {
    Ok(TransferResponse {
        id: uuid(&row.id)?,
        kind: row.kind.parse()?,
        origin_store_id: opt_uuid(row.origin_store_id.as_deref())?,
        destination_store_id: opt_uuid(row.destination_store_id.as_deref())?,
        load_size: row.load_size.parse()?,
        status: row.status.parse()?,
        route_id: opt_uuid(row.route_id.as_deref())?,
        courier_id: opt_uuid(row.courier_id.as_deref())?,
        date: date(&row.date)?,
        created_at: timestamp(&row.created_at)?,
        created_by: opt_uuid(row.created_by.as_deref())?,
        confirmed_at: opt_timestamp(row.confirmed_at.as_deref())?,
        confirmed_by: opt_uuid(row.confirmed_by.as_deref())?,
        product_name: row.product_name,
        brand: row.brand,
        quantity: row.quantity,
        supplier: row.supplier,
        responsible: row.responsible,
        picked_up_by: row.picked_up_by,
        document_number: row.document_number,
        notes: row.notes,
        transfer_number: row.transfer_number,
    })
}

pub fn protocol(row: ProtocolRow) -> Result<ProtocolResponse> {
    Ok(ProtocolResponse {
        id: uuid(&row.id)?,
        date: date(&row.date)?,
        store_id: opt_uuid(row.store_id.as_deref())?,
        status: row.status.parse()?,
        created_at: timestamp(&row.created_at)?,
        created_by: opt_uuid(row.created_by.as_deref())?,
        confirmed_by: opt_uuid(row.confirmed_by.as_deref())?,
        confirmed_at: opt_timestamp(row.confirmed_at.as_deref())?,
        number: row.number,
        kind: row.kind,
        responsible: row.responsible,
        confirmed_name: row.confirmed_name,
    })
}

pub fn movement(row: MovementRow) -> Result<MovementResponse> {
    Ok(MovementResponse {
        id: uuid(&row.id)?,
        kind: row.kind.parse()?,
        date: date(&row.date)?,
        created_at: timestamp(&row.created_at)?,
        protocol: row.protocol,
    })
}

pub fn notification(row: NotificationRow) -> Result<NotificationResponse> {
    Ok(NotificationResponse {
        id: uuid(&row.id)?,
        created_at: timestamp(&row.created_at)?,
        title: row.title,
        body: row.body,
        read: row.read,
    })
}

/// Convert every row, failing on the first bad one.
pub fn all<R, T>(rows: Vec<R>, f: impl Fn(R) -> Result<T>) -> Result<Vec<T>> {
    rows.into_iter().map(f).collect()
}
