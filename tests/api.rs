use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use tokengate_api::{
    config::TokenSettings,
    db::{InMemoryUserRepository, UserRepository},
    models::user::{NewUser, User, UserRole},
    router,
    services::{
        auth::{AuthService, RepositoryAuthenticator},
        client::{ClientKind, HeaderClientClassifier, CLIENT_KIND_HEADER},
        clock::ManualClock,
        credentials::UserCredentialGate,
        password::{BcryptPasswordEncoder, PasswordEncoder},
        token_policy::TokenPolicy,
    },
    AppState,
};

struct TestApp {
    app: Router,
    state: AppState,
    clock: Arc<ManualClock>,
}

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

async fn spawn_app() -> TestApp {
    let clock = Arc::new(ManualClock::new(t0()));
    let repo = Arc::new(InMemoryUserRepository::new());
    let encoder = Arc::new(BcryptPasswordEncoder::new(4));

    for (username, roles) in [
        ("user", vec![UserRole::User]),
        ("admin", vec![UserRole::User, UserRole::Admin]),
    ] {
        repo.insert(NewUser {
            username: username.into(),
            password_hash: encoder.encode("123").unwrap(),
            first_name: None,
            last_name: None,
            email: Some(format!("{username}@example.com")),
            phone: None,
            roles,
            created_at: t0() - Duration::days(1),
        })
        .await
        .unwrap();
    }

    let users: Arc<dyn UserRepository> = repo;
    let auth = AuthService::new(
        TokenPolicy::new(TokenSettings::new("queenvictoria".into(), 100, 200).unwrap()),
        clock.clone(),
        Arc::new(UserCredentialGate::new(users.clone())),
        users.clone(),
        encoder.clone(),
        Some(Arc::new(RepositoryAuthenticator::new(users.clone(), encoder))),
    );

    let state = AppState {
        auth: Arc::new(auth),
        users,
        classifier: Arc::new(HeaderClientClassifier::default()),
    };

    TestApp {
        app: router(state.clone()),
        state,
        clock,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn login_request(username: &str, password: &str, client: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header(CLIENT_KIND_HEADER, client)
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

fn refresh_request(token: &str, client: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(CLIENT_KIND_HEADER, client)
        .body(Body::empty())
        .unwrap()
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn login(app: &Router, username: &str, client: &str) -> String {
    let (status, body) = send(app, login_request(username, "123", client)).await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let t = spawn_app().await;
    let (status, body) = send(
        &t.app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "db": "connected" }));
}

/// Store whose backend is gone: every call fails.
struct UnreachableStore;

#[async_trait]
impl UserRepository for UnreachableStore {
    async fn find_by_username(&self, _username: &str) -> anyhow::Result<Option<User>> {
        anyhow::bail!("connection refused")
    }

    async fn find_by_id(&self, _id: i64) -> anyhow::Result<Option<User>> {
        anyhow::bail!("connection refused")
    }

    async fn find_all(&self) -> anyhow::Result<Vec<User>> {
        anyhow::bail!("connection refused")
    }

    async fn update_password(
        &self,
        _id: i64,
        _password_hash: &str,
        _changed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }

    async fn insert(&self, _user: NewUser) -> anyhow::Result<User> {
        anyhow::bail!("connection refused")
    }

    async fn ping(&self) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
}

#[tokio::test]
async fn health_reports_unavailable_store() {
    let t = spawn_app().await;
    let state = AppState {
        users: Arc::new(UnreachableStore),
        ..t.state.clone()
    };
    let app = router(state);

    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["db"], "connection refused");
}

#[tokio::test]
async fn login_reports_window_per_client() {
    let t = spawn_app().await;

    let (status, body) = send(&t.app, login_request("user", "123", "normal")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expires_in"], 100);

    let (_, body) = send(&t.app, login_request("user", "123", "tablet")).await;
    assert_eq!(body["expires_in"], 100);

    let (_, body) = send(&t.app, login_request("user", "123", "mobile")).await;
    assert_eq!(body["expires_in"], 200);
}

#[tokio::test]
async fn login_with_bad_password_is_unauthorized() {
    let t = spawn_app().await;
    let (status, body) = send(&t.app, login_request("user", "nope", "normal")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["access_token"].is_null());
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn refresh_with_garbage_token_is_empty() {
    let t = spawn_app().await;
    let (status, body) = send(&t.app, refresh_request("123", "normal")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "access_token": null, "expires_in": null }));
}

#[tokio::test]
async fn refresh_without_token_is_empty() {
    let t = spawn_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "access_token": null, "expires_in": null }));
}

#[tokio::test]
async fn refreshes_live_web_token() {
    let t = spawn_app().await;
    let token = login(&t.app, "user", "normal").await;

    t.clock.advance(Duration::seconds(30));
    let expected = t
        .state
        .auth
        .policy()
        .refresh_token(&token, ClientKind::Normal, t0() + Duration::seconds(30))
        .unwrap();

    let (status, body) = send(&t.app, refresh_request(&token, "normal")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "access_token": expected, "expires_in": 100 }));
}

#[tokio::test]
async fn refreshes_live_mobile_token() {
    let t = spawn_app().await;
    let token = login(&t.app, "user", "mobile").await;

    t.clock.advance(Duration::seconds(150));
    let (status, body) = send(&t.app, refresh_request(&token, "mobile")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expires_in"], 200);

    let refreshed = body["access_token"].as_str().unwrap();
    let policy = t.state.auth.policy();
    assert_eq!(
        policy.get_issued_at_date_from_token(refreshed).unwrap(),
        t0() + Duration::seconds(150)
    );
}

#[tokio::test]
async fn expired_tokens_are_not_refreshed() {
    let t = spawn_app().await;
    let web = login(&t.app, "user", "normal").await;
    let mobile = login(&t.app, "user", "mobile").await;

    t.clock.advance(Duration::seconds(200));
    for (token, client) in [(web, "normal"), (mobile, "mobile")] {
        let (status, body) = send(&t.app, refresh_request(&token, client)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["access_token"].is_null());
        assert!(body["expires_in"].is_null());
    }
}

#[tokio::test]
async fn whoami_requires_valid_token() {
    let t = spawn_app().await;

    let request = Request::builder().uri("/api/whoami").body(Body::empty()).unwrap();
    let (status, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&t.app, "user", "normal").await;
    let (status, body) = send(&t.app, get_request("/api/whoami", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "user");
    assert!(body.get("password_hash").is_none());

    t.clock.advance(Duration::seconds(100));
    let (status, _) = send(&t.app, get_request("/api/whoami", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_revokes_old_tokens_immediately() {
    let t = spawn_app().await;
    let token = login(&t.app, "user", "normal").await;

    t.clock.advance(Duration::seconds(10));
    let request = Request::builder()
        .method("POST")
        .uri("/auth/change-password")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "old_password": "123", "new_password": "456" }).to_string(),
        ))
        .unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "success");

    let (status, _) = send(&t.app, get_request("/api/whoami", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&t.app, refresh_request(&token, "normal")).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    t.clock.advance(Duration::seconds(1));
    let (status, body) = send(&t.app, login_request("user", "456", "normal")).await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["access_token"].as_str().unwrap();
    let (status, _) = send(&t.app, get_request("/api/whoami", fresh)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn password_change_with_wrong_old_password_fails() {
    let t = spawn_app().await;
    let token = login(&t.app, "user", "normal").await;

    let request = Request::builder()
        .method("POST")
        .uri("/auth/change-password")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "old_password": "wrong", "new_password": "456" }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.app, get_request("/api/whoami", &token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn user_admin_endpoints_require_admin_role() {
    let t = spawn_app().await;
    let user_token = login(&t.app, "user", "normal").await;
    let admin_token = login(&t.app, "admin", "normal").await;

    let (status, _) = send(&t.app, get_request("/api/user/all", &user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&t.app, get_request("/api/user/all", &admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&t.app, get_request("/api/user/1", &admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "user");

    let (status, _) = send(&t.app, get_request("/api/user/42", &admin_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
