use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand_core::{OsRng, RngCore};
use tracing::info;
use uuid::Uuid;

use depot_db::models::NewUser;
use depot_types::api::{
    CreateUserRequest, PasswordLinkResponse, SetPasswordRequest, SetRoleRequest,
    UpdateUserRequest, UserResponse,
};
use depot_types::models::Role;

use crate::auth::{AppState, MIN_PASSWORD_LEN, hash_password};
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::with_db;

/// Reset links expire after one day.
const RESET_LINK_HOURS: i64 = 24;

pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    user.require_staff()?;
    let rows = with_db(&state, |db| db.list_users()).await?;
    Ok(Json(convert::all(rows, convert::user)?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    admin.require_staff()?;

    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::bad_request("username is required"));
    }
    if req.store_id.is_some() && req.role != Role::Store {
        return Err(ApiError::bad_request("only store users can be linked to a store"));
    }
    let password_hash = match (&req.password, &req.password_confirmation) {
        (None, None) => None,
        (Some(password), confirmation) => {
            validate_password(password, confirmation.as_deref().unwrap_or_default())?;
            Some(hash_password(password)?)
        }
        (None, Some(_)) => return Err(ApiError::bad_request("passwords do not match")),
    };

    let id = Uuid::new_v4();
    let user_id = id.to_string();
    let store_id = req.store_id.map(|s| s.to_string());
    let row = with_db(&state, move |db| {
        if db.get_user_by_username(&username)?.is_some() {
            return Ok(Err(ApiError::conflict("username already taken")));
        }
        if let Some(store_id) = store_id.as_deref() {
            match db.get_store(store_id)? {
                None => return Ok(Err(ApiError::not_found("store not found"))),
                Some(store) if store.user_id.is_some() => {
                    return Ok(Err(ApiError::conflict("store already linked to a user")));
                }
                Some(_) => {}
            }
        }

        let new_user = NewUser {
            id: &user_id,
            username: &username,
            password_hash: password_hash.as_deref(),
            email: req.email.trim(),
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            phone: req.phone.as_deref(),
            role: req.role.as_str(),
            is_active: req.active,
        };
        match db.create_user(&new_user, store_id.as_deref()) {
            Ok(true) => {}
            Ok(false) => return Ok(Err(ApiError::conflict("store already linked to a user"))),
            Err(e) if depot_db::is_unique_violation(&e, "users.username") => {
                return Ok(Err(ApiError::conflict("username already taken")));
            }
            Err(e) => return Err(e),
        }
        Ok(Ok(db.get_user_by_id(&user_id)?))
    })
    .await??
    .ok_or_else(|| anyhow::anyhow!("user {id} vanished after insert"))?;

    let created = convert::user(row)?;
    info!("{} created user {} ({})", admin.username, created.username, created.role);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(admin): Extension<AuthUser>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    admin.require_staff()?;

    let user_id = id.to_string();
    let row = with_db(&state, move |db| {
        let Some(mut row) = db.get_user_by_id(&user_id)? else {
            return Ok(Err(ApiError::not_found("user not found")));
        };

        if let Some(username) = req.username.map(|u| u.trim().to_string()) {
            if username.is_empty() {
                return Ok(Err(ApiError::bad_request("username is required")));
            }
            if username != row.username && db.get_user_by_username(&username)?.is_some() {
                return Ok(Err(ApiError::conflict("username already taken")));
            }
            row.username = username;
        }
        if let Some(email) = req.email {
            row.email = email.trim().to_string();
        }
        if let Some(first_name) = req.first_name {
            row.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = req.last_name {
            row.last_name = last_name.trim().to_string();
        }
        if req.phone.is_some() {
            row.phone = req.phone.filter(|p| !p.trim().is_empty());
        }
        if let Some(active) = req.active {
            row.is_active = active;
        }
        if let Some(role) = req.role {
            row.role = role.as_str().to_string();
        }

        match db.update_user(&row) {
            Ok(_) => {}
            Err(e) if depot_db::is_unique_violation(&e, "users.username") => {
                return Ok(Err(ApiError::conflict("username already taken")));
            }
            Err(e) => return Err(e),
        }
        // The store link may have been released by a role change
        Ok(db.get_user_by_id(&user_id)?.ok_or_else(|| ApiError::not_found("user not found")))
    })
    .await??;

    Ok(Json(convert::user(row)?))
}

pub async fn toggle_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(admin): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    admin.require_staff()?;

    let user_id = id.to_string();
    let row = with_db(&state, move |db| {
        if db.toggle_user_active(&user_id)?.is_none() {
            return Ok(None);
        }
        db.get_user_by_id(&user_id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("user not found"))?;

    info!("{} set {} active={}", admin.username, row.username, row.is_active);
    Ok(Json(convert::user(row)?))
}

/// Replace the user's role.
pub async fn set_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(admin): Extension<AuthUser>,
    Json(req): Json<SetRoleRequest>,
) -> ApiResult<Json<UserResponse>> {
    admin.require_staff()?;

    let user_id = id.to_string();
    let row = with_db(&state, move |db| {
        if !db.set_user_role(&user_id, req.role.as_str())? {
            return Ok(None);
        }
        db.get_user_by_id(&user_id)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("user not found"))?;

    Ok(Json(convert::user(row)?))
}

pub async fn set_password(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(admin): Extension<AuthUser>,
    Json(req): Json<SetPasswordRequest>,
) -> ApiResult<StatusCode> {
    admin.require_staff()?;
    validate_password(&req.password, &req.password_confirmation)?;

    let hash = hash_password(&req.password)?;
    let user_id = id.to_string();
    let updated = with_db(&state, move |db| db.set_user_password(&user_id, Some(&hash))).await?;
    if !updated {
        return Err(ApiError::not_found("user not found"));
    }

    info!("{} set a new password for {}", admin.username, id);
    Ok(StatusCode::NO_CONTENT)
}

/// Issue a single-use reset token the user can redeem at `/auth/password-reset`.
pub async fn password_link(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(admin): Extension<AuthUser>,
) -> ApiResult<Json<PasswordLinkResponse>> {
    admin.require_staff()?;

    let token = generate_reset_token();
    let expires_at = chrono::Utc::now() + chrono::Duration::hours(RESET_LINK_HOURS);

    let user_id = id.to_string();
    let stored_token = token.clone();
    let stored_expiry = expires_at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    let created = with_db(&state, move |db| {
        if db.get_user_by_id(&user_id)?.is_none() {
            return Ok(false);
        }
        db.create_password_reset(&stored_token, &user_id, &stored_expiry)?;
        Ok(true)
    })
    .await?;
    if !created {
        return Err(ApiError::not_found("user not found"));
    }

    Ok(Json(PasswordLinkResponse {
        path: format!("/auth/password-reset?token={token}"),
        token,
        expires_at,
    }))
}

fn validate_password(password: &str, confirmation: &str) -> ApiResult<()> {
    if password != confirmation {
        return Err(ApiError::bad_request("passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_tokens_are_url_safe_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("longenough", "longenough").is_ok());
        assert!(matches!(
            validate_password("longenough", "different1"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(validate_password("short", "short"), Err(ApiError::BadRequest(_))));
    }
}
