use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::{auth::bearer_token, client::CurrentClient},
    models::{
        auth::{AuthenticatedUser, UserTokenState},
        user::{ChangePasswordRequest, LoginRequest},
    },
    routes::reject,
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    CurrentClient(client): CurrentClient,
    Json(body): Json<LoginRequest>,
) -> Result<Json<UserTokenState>, (StatusCode, Json<Value>)> {
    state
        .auth
        .login(&body.username, &body.password, client)
        .await
        .map(Json)
        .map_err(reject)
}

/// 200 with a fresh token, or 202 with both fields null when refused.
pub async fn refresh_token(
    State(state): State<AppState>,
    CurrentClient(client): CurrentClient,
    headers: HeaderMap,
) -> (StatusCode, Json<UserTokenState>) {
    let token_state = state.auth.refresh(bearer_token(&headers), client).await;
    let status = if token_state.access_token.is_some() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    (status, Json(token_state))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .auth
        .change_password(&user, &body.old_password, &body.new_password)
        .await
        .map(|_| Json(json!({ "result": "success" })))
        .map_err(reject)
}
