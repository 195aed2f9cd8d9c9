//! User self-service routes.

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use azul_auth::Identity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::auth::{auth_guard, CallerIdentity};
use crate::state::AppState;

/// Parsed information about the current user.
///
/// `credentials` is always `null`: the caller's token is never echoed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub username: String,
    pub org: String,
    pub email: String,
    pub roles: Vec<String>,
    pub unique_id: String,
    /// Full claim set from the verified token.
    #[schema(value_type = Object)]
    pub decoded: Map<String, Value>,
    #[schema(value_type = Option<Object>)]
    pub credentials: Option<Value>,
}

impl From<&Identity> for UserInfo {
    fn from(identity: &Identity) -> Self {
        Self {
            username: identity.username().to_string(),
            org: identity.organization().to_string(),
            email: identity.email().to_string(),
            roles: identity.roles().to_vec(),
            unique_id: identity.unique_id().to_string(),
            decoded: identity.raw_claims().clone(),
            credentials: None,
        }
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v0/users/me", get(read_users_me))
        .route_layer(from_fn_with_state(state, auth_guard))
}

/// GET /v0/users/me: Return parsed info for the current user.
#[utoipa::path(
    get,
    path = "/v0/users/me",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Invalid or expired token", body = crate::error::ErrorBody),
        (status = 403, description = "No token presented", body = crate::error::ErrorBody),
        (status = 503, description = "Identity provider down", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn read_users_me(caller: CallerIdentity) -> Json<UserInfo> {
    Json(UserInfo::from(&*caller))
}
