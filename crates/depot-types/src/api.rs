use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    LoadSize, MovementKind, ProtocolStatus, Role, RouteStatus, StopProgress, StopStatus,
    TransferKind, TransferStatus,
};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the gateway upgrade check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub active: bool,
    pub store_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default = "default_true")]
    pub active: bool,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    /// Store linked to a `store` user.
    pub store_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPasswordRequest {
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordLinkResponse {
    pub token: String,
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    #[serde(default)]
    pub body: String,
    pub attachment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub body: String,
}

/// A chat message as returned by the REST API and pushed over the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub body: String,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub recipient_id: Uuid,
    pub read: bool,
    pub edited: bool,
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `HH:MM`, for the conversation bubble.
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactResponse {
    pub user_id: Uuid,
    pub username: String,
    pub unread: u32,
    pub last_interaction: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadSummary {
    pub has_unread: bool,
    pub count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub marked: u32,
}

// -- Files --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: Uuid,
    pub size: u64,
    pub sha256: String,
}

// -- Stores --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub district: String,
    pub number: String,
    pub complement: Option<String>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub active: bool,
    pub user_id: Option<Uuid>,
}

/// Body for both creating and replacing a store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreRequest {
    pub name: String,
    pub city: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_postal_code")]
    pub postal_code: String,
    #[serde(default = "default_district")]
    pub district: String,
    #[serde(default = "default_number")]
    pub number: String,
    pub complement: Option<String>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

// -- Routes & stops --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRouteRequest {
    pub courier_id: Uuid,
    #[serde(default)]
    pub store_ids: Vec<Uuid>,
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub date: NaiveDate,
    pub courier_id: Option<Uuid>,
    pub courier_username: Option<String>,
    pub status: RouteStatus,
    pub total_stops: u32,
    pub collected_stops: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub id: Uuid,
    pub route_id: Uuid,
    pub store_id: Uuid,
    pub store_name: String,
    pub position: i64,
    pub status: StopStatus,
    pub visited: bool,
    pub collected_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub progress: StopProgress,
    pub transfer_to_collect: Option<Uuid>,
    pub transfer_to_deliver: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteDetail {
    pub id: Uuid,
    pub name: Option<String>,
    pub date: NaiveDate,
    pub courier_id: Option<Uuid>,
    pub courier_username: Option<String>,
    pub status: RouteStatus,
    pub stops: Vec<StopResponse>,
    pub transfer_ids: Vec<Uuid>,
}

/// A stop as seen from the store it visits.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreStopResponse {
    pub id: Uuid,
    pub route_id: Uuid,
    pub route_date: NaiveDate,
    pub route_status: RouteStatus,
    pub position: i64,
    pub status: StopStatus,
    pub collected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddStopRequest {
    pub store_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReorderStopsRequest {
    pub ids: Vec<Uuid>,
}

// -- Transfers --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransferRequest {
    pub kind: TransferKind,
    pub origin_store_id: Option<Uuid>,
    pub destination_store_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    pub supplier: Option<String>,
    pub responsible: Option<String>,
    pub courier_id: Option<Uuid>,
    pub picked_up_by: Option<String>,
    pub date: Option<NaiveDate>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub transfer_number: Option<String>,
    #[serde(default = "default_load_size")]
    pub load_size: LoadSize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    pub id: Uuid,
    pub kind: TransferKind,
    pub origin_store_id: Option<Uuid>,
    pub destination_store_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub quantity: i64,
    pub supplier: Option<String>,
    pub responsible: Option<String>,
    pub picked_up_by: Option<String>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub transfer_number: String,
    pub load_size: LoadSize,
    pub status: TransferStatus,
    pub route_id: Option<Uuid>,
    pub courier_id: Option<Uuid>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PickedUpByRequest {
    pub picked_up_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildRouteRequest {
    pub transfer_ids: Vec<Uuid>,
}

// -- Protocols --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProtocolRequest {
    pub store_id: Option<Uuid>,
    pub kind: Option<String>,
    pub responsible: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmProtocolRequest {
    pub confirmed_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProtocolResponse {
    pub id: Uuid,
    pub number: String,
    pub kind: Option<String>,
    pub date: NaiveDate,
    pub store_id: Option<Uuid>,
    pub responsible: Option<String>,
    pub status: ProtocolStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub confirmed_name: Option<String>,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

// -- Stock movements --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMovementRequest {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub protocol: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MovementResponse {
    pub id: Uuid,
    pub kind: MovementKind,
    pub date: NaiveDate,
    pub protocol: String,
    pub created_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_state() -> String {
    "SP".into()
}

fn default_postal_code() -> String {
    "00000-000".into()
}

fn default_district() -> String {
    "Centro".into()
}

fn default_number() -> String {
    "S/N".into()
}

fn default_load_size() -> LoadSize {
    LoadSize::Small
}
