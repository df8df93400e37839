//! Database row types. These map directly to SQLite rows and stay as plain
//! strings; the API layer parses ids, timestamps and status columns.

pub struct UserRow {
    pub id: String,
    pub username: String,
    /// Argon2 PHC string; `None` means the account has no usable password.
    pub password: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
    /// Store linked to this user, if any.
    pub store_id: Option<String>,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub password_hash: Option<&'a str>,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
    pub role: &'a str,
    pub is_active: bool,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub recipient_id: String,
    pub body: String,
    pub created_at: String,
    pub read: bool,
    pub edited: bool,
    pub attachment_id: Option<String>,
}

pub struct ContactRow {
    pub user_id: String,
    pub username: String,
    pub unread: u32,
    pub last_interaction: Option<String>,
}

pub struct FileRow {
    pub id: String,
    pub uploader_id: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}

pub struct StoreRow {
    pub id: String,
    pub user_id: Option<String>,
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
}

pub struct RouteRow {
    pub id: String,
    pub name: Option<String>,
    pub date: String,
    pub courier_id: Option<String>,
    pub courier_username: Option<String>,
    pub status: String,
    pub created_at: String,
    pub total_stops: u32,
    pub collected_stops: u32,
}

pub struct StopRow {
    pub id: String,
    pub route_id: String,
    pub store_id: String,
    pub store_name: String,
    pub position: i64,
    pub status: String,
    pub visited: bool,
    pub collected_at: Option<String>,
    pub notes: Option<String>,
}

pub struct StoreStopRow {
    pub id: String,
    pub route_id: String,
    pub route_date: String,
    pub route_status: String,
    pub position: i64,
    pub status: String,
    pub collected_at: Option<String>,
}

pub struct TransferRow {
    pub id: String,
    pub kind: String,
    pub origin_store_id: Option<String>,
    pub destination_store_id: Option<String>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub quantity: i64,
    pub supplier: Option<String>,
    pub responsible: Option<String>,
    pub picked_up_by: Option<String>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub transfer_number: String,
    pub load_size: String,
    pub status: String,
    pub route_id: Option<String>,
    pub courier_id: Option<String>,
    pub date: String,
    pub created_at: String,
    pub created_by: Option<String>,
    pub confirmed_at: Option<String>,
    pub confirmed_by: Option<String>,
}

pub struct NewTransfer {
    pub id: String,
    pub kind: String,
    pub origin_store_id: Option<String>,
    pub destination_store_id: Option<String>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub quantity: i64,
    pub supplier: Option<String>,
    pub responsible: Option<String>,
    pub picked_up_by: Option<String>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub transfer_number: String,
    pub load_size: String,
    pub courier_id: Option<String>,
    pub date: String,
    pub created_by: String,
}

pub struct ProtocolRow {
    pub id: String,
    pub number: String,
    pub kind: Option<String>,
    pub date: String,
    pub store_id: Option<String>,
    pub responsible: Option<String>,
    pub status: String,
    pub created_at: String,
    pub created_by: Option<String>,
    pub confirmed_name: Option<String>,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<String>,
}

pub struct MovementRow {
    pub id: String,
    pub kind: String,
    pub date: String,
    pub protocol: String,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: String,
}

pub struct NewRoute {
    pub id: String,
    pub name: Option<String>,
    pub date: String,
    pub courier_id: Option<String>,
    pub status: String,
}

pub struct NewNotification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
}

/// Outcome of turning a set of transfers into a courier route.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteBuild {
    Created { stops: usize },
    MissingTransfer(String),
    AlreadyRouted(String),
}

/// Narrowing applied to the unrouted transfer list.
#[derive(Default)]
pub struct TransferFilter<'a> {
    pub load_size: Option<&'a str>,
    pub status: Option<&'a str>,
    /// Only transfers leaving from or arriving at this store.
    pub store_id: Option<&'a str>,
}
