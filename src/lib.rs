// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use db::UserRepository;
use services::{auth::AuthService, client::ClientClassifier};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserRepository>,
    pub classifier: Arc<dyn ClientClassifier>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh_token))
        .route("/auth/change-password", post(routes::auth::change_password))
        // Users
        .route("/api/whoami", get(routes::users::whoami))
        .route("/api/user/all", get(routes::users::list_users))
        .route("/api/user/{id}", get(routes::users::get_user))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
