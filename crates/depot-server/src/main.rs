mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use depot_api::auth::{AppState, AppStateInner, MIN_PASSWORD_LEN, decode_token, hash_password};
use depot_api::error::ApiError;
use depot_api::storage::Storage;
use depot_db::Database;
use depot_db::models::NewUser;
use depot_gateway::connection;
use depot_gateway::dispatcher::Dispatcher;
use depot_types::models::Role;

use crate::config::{AdminBootstrap, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "depot_server=debug,depot_api=debug,depot_gateway=debug,tower_http=debug".into()
                }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and upload storage
    let db = Database::open(&config.db_path)?;
    if let Some(admin) = &config.admin {
        bootstrap_admin(&db, admin)?;
    }
    let storage = Storage::new(config.uploads_dir.clone()).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        dispatcher: Dispatcher::new(),
        storage,
    });

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = depot_api::router(state)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Depot server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Create the first administrator on an empty database.
fn bootstrap_admin(db: &Database, admin: &AdminBootstrap) -> anyhow::Result<()> {
    if db.count_users()? > 0 {
        return Ok(());
    }
    if admin.password.chars().count() < MIN_PASSWORD_LEN {
        anyhow::bail!("DEPOT_ADMIN_PASSWORD must have at least {MIN_PASSWORD_LEN} characters");
    }

    let hash = hash_password(&admin.password)?;
    let id = Uuid::new_v4().to_string();
    let created = db.create_user(
        &NewUser {
            id: &id,
            username: &admin.username,
            password_hash: Some(&hash),
            email: "",
            first_name: "",
            last_name: "",
            phone: None,
            role: Role::Admin.as_str(),
            is_active: true,
        },
        None,
    );
    match created {
        Ok(_) => info!("Created initial admin {}", admin.username),
        Err(e) if depot_db::is_unique_violation(&e, "users.username") => {
            warn!("Initial admin {} already exists, skipping", admin.username);
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// also travel as `?token=`.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = match query.token {
        Some(token) => token,
        None => headers
            .typed_get::<Authorization<Bearer>>()
            .map(|bearer| bearer.token().to_string())
            .ok_or(ApiError::Unauthorized)?,
    };
    let claims = decode_token(&state.jwt_secret, &token).ok_or(ApiError::Unauthorized)?;

    let db_state = state.clone();
    let id = claims.sub.to_string();
    let user = tokio::task::spawn_blocking(move || db_state.db.get_user_by_id(&id))
        .await
        .map_err(|e| ApiError::Internal(e.into()))??
        .filter(|u| u.is_active)
        .ok_or(ApiError::Unauthorized)?;

    let dispatcher = state.dispatcher.clone();
    let user_id = claims.sub;
    Ok(ws
        .on_upgrade(move |socket| {
            connection::handle_connection(socket, dispatcher, user_id, user.username)
        })
        .into_response())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(password: &str) -> AdminBootstrap {
        AdminBootstrap {
            username: "root".into(),
            password: password.into(),
        }
    }

    #[test]
    fn bootstrap_only_runs_on_an_empty_database() {
        let db = Database::open_in_memory().unwrap();
        bootstrap_admin(&db, &admin("password123")).unwrap();
        assert_eq!(db.count_users().unwrap(), 1);

        let user = db.get_user_by_username("root").unwrap().unwrap();
        assert_eq!(user.role, "admin");
        assert!(user.password.is_some());

        let other = AdminBootstrap {
            username: "other".into(),
            ..admin("password123")
        };
        bootstrap_admin(&db, &other).unwrap();
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn bootstrap_rejects_short_passwords() {
        let db = Database::open_in_memory().unwrap();
        assert!(bootstrap_admin(&db, &admin("short")).is_err());
        assert_eq!(db.count_users().unwrap(), 0);
    }
}
