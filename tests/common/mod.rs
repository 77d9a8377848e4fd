//! Common test utilities for identity-service integration tests.
//!
//! Tests drive the full router through `tower::ServiceExt::oneshot` against
//! an in-memory store, so no database is required.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::Algorithm;
use secrecy::Secret;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use identity_service::{
    build_router,
    config::{Config, DatabaseConfig, JwtConfig, ServerConfig},
    services::{JwtService, MockUserStore, UserStore},
    AppState,
};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,identity_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config() -> Config {
    Config {
        service_name: "identity-service-test".to_string(),
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            allowed_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: Secret::new("postgres://localhost/identity_test".to_string()),
            max_connections: 2,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: Secret::new("integration-test-secret".to_string()),
            algorithm: Algorithm::HS256,
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
    }
}

/// Build a router backed by an in-memory store.
pub async fn spawn_app() -> Router {
    init_tracing();

    let config = test_config();
    let jwt = JwtService::new(&config.jwt).expect("Failed to create JWT service");
    let store: Arc<dyn UserStore> = Arc::new(MockUserStore::new());
    let state = AppState::new(config, store, jwt);

    build_router(state).await.expect("Failed to build router")
}

/// Send a request with an optional JSON body and bearer token, returning
/// the status and the parsed response body.
pub async fn send_request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, body)
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    send_request(app, "GET", uri, token, None).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    send_request(app, "POST", uri, token, Some(body)).await
}

/// Register an account and return its projection.
pub async fn register_user(app: &Router, name: &str, email: &str, password: &str) -> Value {
    let (status, body) = post_json(
        app,
        "/api/v1/account/register",
        None,
        json!({ "name": name, "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    body
}

/// Log in and return the token response.
pub async fn login_user(app: &Router, email: &str, password: &str) -> Value {
    let (status, body) = post_json(
        app,
        "/api/v1/account/login",
        None,
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

/// Register, log in and return an access token for authenticated calls.
pub async fn authenticated_token(app: &Router, name: &str, email: &str, password: &str) -> String {
    register_user(app, name, email, password).await;
    let tokens = login_user(app, email, password).await;
    tokens["access_token"].as_str().unwrap().to_string()
}
