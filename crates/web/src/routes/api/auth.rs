//! Field-app login.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use cfac_core::Role;

use crate::db::UserRepository;
use crate::error::{ApiError, ApiResult};
use crate::services::auth::verify_password;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(ApiError::bad_request("Username and password required."));
    };
    let username = username.trim().to_lowercase();

    let users = UserRepository::new(state.pool());
    let Some(user) = users.get_by_login(&username).await? else {
        tracing::warn!(username = %username, "API login for unknown user");
        return Err(ApiError::unauthorized("Invalid username."));
    };

    let hash = users.get_password_hash(user.id).await?.unwrap_or_default();
    if verify_password(&password, &hash).is_err() {
        tracing::warn!(user_id = %user.id, "API login with wrong password");
        return Err(ApiError::unauthorized("Invalid password."));
    }

    if !matches!(user.role, Role::Tech | Role::Sales) {
        tracing::warn!(user_id = %user.id, role = %user.role, "API login for unsupported role");
        return Err(ApiError::unauthorized("User type not supported."));
    }

    let token = state.jwt().issue(user.id)?;
    tracing::info!(user_id = %user.id, role = %user.role, "API login");

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user_type": user.role,
    })))
}
