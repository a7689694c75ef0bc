pub mod auth;
pub mod health;
pub mod users;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

use crate::services::auth::AuthError;

/// Maps a service error to the `{"error": ...}` response body.
pub fn reject(e: AuthError) -> (StatusCode, Json<Value>) {
    let status = e.status();
    if status.is_server_error() {
        tracing::error!(error = %e, "Request failed");
        return (status, Json(json!({ "error": "Internal server error" })));
    }
    (status, Json(json!({ "error": e.to_string() })))
}
