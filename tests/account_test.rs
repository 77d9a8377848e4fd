//! Integration tests for registration, login, refresh and /account/me.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::util::ServiceExt;

use common::{authenticated_token, get, login_user, post_json, register_user, spawn_app};

#[tokio::test]
async fn test_register_returns_projection_without_secrets() {
    let app = spawn_app().await;

    let body = register_user(&app, "Ana Lopez", "ana@example.com", "test_password_123").await;

    assert_eq!(body["name"], "Ana Lopez");
    assert_eq!(body["email"], "ana@example.com");
    assert!(body["id"].as_str().is_some());
    assert!(body["created_at"].as_str().is_some());
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
    assert!(body.get("deleted").is_none());
}

#[tokio::test]
async fn test_register_always_assigns_base_permission() {
    let app = spawn_app().await;

    // Extra fields in the payload are ignored; permissions cannot be chosen
    let (status, body) = post_json(
        &app,
        "/api/v1/account/register",
        None,
        json!({
            "name": "Ana",
            "email": "ana@example.com",
            "password": "test_password_123",
            "permissions": ["ADMIN"]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["permissions"], json!(["USER"]));
}

#[tokio::test]
async fn test_register_rejects_duplicate_email() {
    let app = spawn_app().await;
    register_user(&app, "Ana", "ana@example.com", "test_password_123").await;

    let (status, body) = post_json(
        &app,
        "/api/v1/account/register",
        None,
        json!({ "name": "Other", "email": "ana@example.com", "password": "test_password_123" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email 'ana@example.com' is already in use");
}

#[tokio::test]
async fn test_register_validates_payload() {
    let app = spawn_app().await;

    let (status, _) = post_json(
        &app,
        "/api/v1/account/register",
        None,
        json!({ "name": "Ana", "email": "not-an-email", "password": "test_password_123" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post_json(
        &app,
        "/api/v1/account/register",
        None,
        json!({ "name": "Ana", "email": "ana@example.com", "password": "short" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_returns_bearer_token_pair() {
    let app = spawn_app().await;
    register_user(&app, "Ana", "ana@example.com", "test_password_123").await;

    let tokens = login_user(&app, "ana@example.com", "test_password_123").await;

    assert_eq!(tokens["token_type"], "bearer");
    assert_eq!(tokens["expires_in"], 15 * 60);
    assert!(tokens["access_token"].as_str().is_some());
    assert!(tokens["refresh_token"].as_str().is_some());
    assert_ne!(tokens["access_token"], tokens["refresh_token"]);
}

#[tokio::test]
async fn test_login_failure_does_not_reveal_which_part_was_wrong() {
    let app = spawn_app().await;
    register_user(&app, "Ana", "ana@example.com", "test_password_123").await;

    let (wrong_status, wrong_body) = post_json(
        &app,
        "/api/v1/account/login",
        None,
        json!({ "email": "ana@example.com", "password": "bad_password_123" }),
    )
    .await;
    let (unknown_status, unknown_body) = post_json(
        &app,
        "/api/v1/account/login",
        None,
        json!({ "email": "ghost@example.com", "password": "bad_password_123" }),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["error"], "Invalid email or password");
    assert_eq!(wrong_body["error"], unknown_body["error"]);
}

#[tokio::test]
async fn test_refresh_issues_new_pair() {
    let app = spawn_app().await;
    register_user(&app, "Ana", "ana@example.com", "test_password_123").await;
    let tokens = login_user(&app, "ana@example.com", "test_password_123").await;

    let (status, body) = post_json(
        &app,
        "/api/v1/account/refresh",
        None,
        json!({ "refresh_token": tokens["refresh_token"] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert!(body["access_token"].as_str().is_some());

    // The new access token is accepted by protected routes
    let access = body["access_token"].as_str().unwrap();
    let (status, me) = get(&app, "/api/v1/account/me", Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ana@example.com");
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = spawn_app().await;
    register_user(&app, "Ana", "ana@example.com", "test_password_123").await;
    let tokens = login_user(&app, "ana@example.com", "test_password_123").await;

    let (status, _) = post_json(
        &app,
        "/api/v1/account/refresh",
        None,
        json!({ "refresh_token": tokens["access_token"] }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_garbage_token() {
    let app = spawn_app().await;

    let (status, _) = post_json(
        &app,
        "/api/v1/account/refresh",
        None,
        json!({ "refresh_token": "not.a.jwt" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_current_user() {
    let app = spawn_app().await;
    let token = authenticated_token(&app, "Ana", "ana@example.com", "test_password_123").await;

    let (status, body) = get(&app, "/api/v1/account/me", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ana@example.com");
    assert_eq!(body["permissions"], json!(["USER"]));
}

#[tokio::test]
async fn test_me_without_token_returns_www_authenticate() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/account/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let www = response
        .headers()
        .get("www-authenticate")
        .expect("401 must carry WWW-Authenticate");
    assert_eq!(www, "Bearer");
}

#[tokio::test]
async fn test_me_rejects_refresh_token() {
    let app = spawn_app().await;
    register_user(&app, "Ana", "ana@example.com", "test_password_123").await;
    let tokens = login_user(&app, "ana@example.com", "test_password_123").await;

    let refresh = tokens["refresh_token"].as_str().unwrap();
    let (status, _) = get(&app, "/api/v1/account/me", Some(refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
