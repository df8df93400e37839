use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use depot_types::models::Role;

use crate::auth::{AppState, decode_token};
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::with_db;

/// The signed-in user, as loaded from the database for this request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    /// Store linked to a `store` user.
    pub store_id: Option<Uuid>,
}

impl AuthUser {
    pub fn require_staff(&self) -> ApiResult<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden("administrators only"))
        }
    }

    pub fn require_logistics(&self) -> ApiResult<()> {
        if self.role.manages_logistics() {
            Ok(())
        } else {
            Err(ApiError::forbidden("not allowed for your role"))
        }
    }

    /// Logistics staff, or the courier assigned to the resource.
    pub fn is_logistics_or(&self, courier_id: Option<Uuid>) -> bool {
        self.role.manages_logistics() || (self.role.is_courier() && courier_id == Some(self.id))
    }
}

/// Validate the bearer JWT, then load the user so that deactivated or
/// deleted accounts are refused even while their token is still valid.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthorized)?;

    let claims = decode_token(&state.jwt_secret, bearer.token()).ok_or(ApiError::Unauthorized)?;

    let id = claims.sub.to_string();
    let user = with_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .filter(|u| u.is_active)
        .ok_or(ApiError::Unauthorized)?;

    // Role and store link come from the database, not the token
    let auth_user = AuthUser {
        id: claims.sub,
        role: user.role.parse().map_err(anyhow::Error::from)?,
        store_id: convert::opt_uuid(user.store_id.as_deref())?,
        username: user.username,
    };

    req.extensions_mut().insert(auth_user);
    Ok(next.run(req).await)
}
