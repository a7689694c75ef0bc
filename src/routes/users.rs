use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::{
    middleware::auth::AdminUser,
    models::{auth::AuthenticatedUser, user::UserProfile},
    routes::reject,
    services::auth::AuthError,
    AppState,
};

pub async fn whoami(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserProfile>, (StatusCode, Json<Value>)> {
    state
        .users
        .find_by_id(user.user_id)
        .await
        .map_err(|e| reject(AuthError::Internal(e)))?
        .map(|u| Json(UserProfile::from(u)))
        .ok_or_else(|| reject(AuthError::UserNotFound))
}

pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, (StatusCode, Json<Value>)> {
    state
        .users
        .find_by_id(id)
        .await
        .map_err(|e| reject(AuthError::Internal(e)))?
        .map(|u| Json(UserProfile::from(u)))
        .ok_or_else(|| reject(AuthError::UserNotFound))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserProfile>>, (StatusCode, Json<Value>)> {
    let users = state
        .users
        .find_all()
        .await
        .map_err(|e| reject(AuthError::Internal(e)))?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}
