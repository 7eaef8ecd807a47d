#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use capacity_api::config::{RateLimitConfig, ServerConfig, SessionConfig};
use capacity_api::router::build_app_router;
use capacity_api::state::AppState;
use capacity_db::{MemoryBackend, SessionBackend, UserBackend};

pub const PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
///
/// Proxy headers are trusted so each test can pick its client address with
/// `X-Forwarded-For`.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        production: false,
        trust_proxy_headers: true,
        password_min_length: 8,
        session: SessionConfig::default(),
        rate_limits: RateLimitConfig::default(),
    }
}

/// A router over the in-memory backend, plus handles for arranging state.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub backend: Arc<MemoryBackend>,
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_config(test_config())
}

pub fn build_test_app_with_config(config: ServerConfig) -> TestApp {
    let backend = Arc::new(MemoryBackend::new());
    let state = AppState::new(config.clone(), backend.clone(), backend.clone());
    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        backend,
    }
}

/// Build the full router over arbitrary backends.
pub fn build_app_with_backends(
    sessions: Arc<dyn SessionBackend>,
    users: Arc<dyn UserBackend>,
) -> Router {
    let config = test_config();
    let state = AppState::new(config.clone(), sessions, users);
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn json_request(
    method: &str,
    uri: &str,
    ip: &str,
    body: Value,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", ip)
        .header("user-agent", "capacity-tests/1.0")
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, ip: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", ip);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, ip: &str, body: Value) -> Response<Body> {
    send(app, json_request("POST", uri, ip, body, None)).await
}

pub async fn get_with_cookie(app: &Router, uri: &str, ip: &str, cookie: &str) -> Response<Body> {
    send(app, empty_request("GET", uri, ip, Some(cookie))).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Auth flows
// ---------------------------------------------------------------------------

/// The `Set-Cookie` header of a response.
pub fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .expect("response should set a cookie")
        .to_str()
        .unwrap()
        .to_string()
}

/// The `name=value` pair of the `Set-Cookie` header, ready for a `Cookie` header.
pub fn cookie_pair(response: &Response<Body>) -> String {
    set_cookie(response)
        .split(';')
        .next()
        .unwrap()
        .trim()
        .to_string()
}

/// The raw session token from a `Set-Cookie` header.
pub fn token_of(response: &Response<Body>) -> String {
    cookie_pair(response)
        .split_once('=')
        .unwrap()
        .1
        .to_string()
}

pub async fn register(app: &Router, ip: &str, email: &str) -> Value {
    let response = post_json(
        app,
        "/api/v1/auth/register",
        ip,
        json!({ "email": email, "name": "Test User", "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

pub async fn login(app: &Router, ip: &str, email: &str, password: &str) -> Response<Body> {
    post_json(
        app,
        "/api/v1/auth/login",
        ip,
        json!({ "email": email, "password": password }),
    )
    .await
}

/// Register an account and log in. Returns `(user id, cookie pair)`.
pub async fn signed_in_user(app: &Router, ip: &str, email: &str) -> (i64, String) {
    let user = register(app, ip, email).await;
    let response = login(app, ip, email, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&response);
    (user["data"]["id"].as_i64().unwrap(), cookie)
}
