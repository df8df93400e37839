pub mod auth;
pub mod chat;
pub mod convert;
pub mod error;
pub mod files;
pub mod middleware;
pub mod notifications;
pub mod protocols;
pub mod routes;
pub mod stock;
pub mod storage;
pub mod stores;
pub mod transfers;
pub mod users;

#[cfg(test)]
mod tests;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use tracing::error;

use depot_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// Run a blocking database call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}

/// Today's calendar date in server local time.
pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

/// Build the REST router. The `/gateway` WebSocket upgrade is mounted by the
/// server binary.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/password-reset", post(auth::reset_password));

    let protected = Router::new()
        .route("/me", get(auth::me))
        // Chat
        .route("/chat/contacts", get(chat::list_contacts))
        .route("/chat/unread", get(chat::unread_summary))
        .route("/chat/conversations/{user_id}/messages", get(chat::get_conversation))
        .route("/chat/conversations/{user_id}/read", post(chat::mark_read))
        .route("/chat/messages", post(chat::send_message))
        .route(
            "/chat/messages/{id}",
            put(chat::edit_message).delete(chat::delete_message),
        )
        // Attachments
        .route(
            "/files",
            post(files::upload_file).layer(DefaultBodyLimit::max(files::MAX_FILE_SIZE + 1)),
        )
        .route("/files/{id}", get(files::download_file))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}/toggle-active", post(users::toggle_active))
        .route("/users/{id}/role", put(users::set_role))
        .route("/users/{id}/password", put(users::set_password))
        .route("/users/{id}/password-link", post(users::password_link))
        // Stores
        .route("/stores", get(stores::list_stores).post(stores::create_store))
        .route("/stores/mine/stops", get(stores::my_stops))
        .route("/stores/{id}", put(stores::update_store))
        // Routes and stops
        .route("/routes", get(routes::list_routes).post(routes::create_route))
        .route("/routes/{id}", get(routes::get_route))
        .route("/routes/{id}/stops", post(routes::add_stop))
        .route("/routes/{id}/stops/order", put(routes::reorder_stops))
        .route("/stops/{id}/collect", post(routes::collect_stop))
        // Transfers
        .route(
            "/transfers",
            get(transfers::list_transfers).post(transfers::create_transfer),
        )
        .route("/transfers/route", post(transfers::build_courier_route))
        .route(
            "/transfers/{id}",
            get(transfers::get_transfer).delete(transfers::delete_transfer),
        )
        .route("/transfers/{id}/picked-up-by", put(transfers::update_picked_up_by))
        .route("/transfers/{id}/confirm", post(transfers::confirm_transfer))
        .route("/transfers/{id}/pickup", post(transfers::pick_up))
        .route("/transfers/{id}/receive", post(transfers::receive))
        // Protocols
        .route(
            "/protocols",
            get(protocols::list_protocols).post(protocols::create_protocol),
        )
        .route("/protocols/{id}/confirm", post(protocols::confirm_protocol))
        // Stock
        .route("/stock/movements", get(stock::list_movements))
        .route("/stock/entries", post(stock::create_entry))
        .route("/stock/exits", post(stock::create_exit))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/{id}/read", post(notifications::mark_notification_read))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    public.merge(protected).with_state(state)
}
