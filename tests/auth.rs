//! Auth tests
//!
//! Covers signup, login/logout, session cookies, and the IP rate limiter.

mod common;

use axum::http::{Method, StatusCode};
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;
use std::net::SocketAddr;

// ===========================================================================
// Signup
// ===========================================================================

#[tokio::test]
async fn signup_valid_data() {
    let app = app().await;

    let resp = app
        .post_json(
            "/api/auth/signup",
            json!({
                "email": "signup_ok@example.com",
                "username": "signup_ok",
                "password": "Securepassword123"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert!(body["id"].is_i64());
    assert_eq!(body["email"].as_str().unwrap(), "signup_ok@example.com");
    assert_eq!(body["username"].as_str().unwrap(), "signup_ok");
    assert_eq!(body["role"].as_str().unwrap(), "user");
    assert_eq!(body["tier"].as_str().unwrap(), "free");
}

#[tokio::test]
async fn signup_duplicate_email() {
    let app = app().await;
    let existing = app.create_user("dup_email").await;

    let resp = app
        .post_json(
            "/api/auth/signup",
            json!({
                "email": existing.email,
                "username": "dup_email_other",
                "password": "Securepassword123"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Email already registered");
}

#[tokio::test]
async fn signup_duplicate_username() {
    let app = app().await;
    let existing = app.create_user("dup_name").await;

    let resp = app
        .post_json(
            "/api/auth/signup",
            json!({
                "email": "dup_name_other@example.com",
                "username": existing.username,
                "password": "Securepassword123"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Username already taken");
}

#[tokio::test]
async fn signup_rejects_short_password() {
    let app = app().await;

    let resp = app
        .post_json(
            "/api/auth/signup",
            json!({
                "email": "shortpw@example.com",
                "username": "shortpw",
                "password": "short"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_rejects_bad_email() {
    let app = app().await;

    let resp = app
        .post_json(
            "/api/auth/signup",
            json!({
                "email": "not-an-email",
                "username": "bademail",
                "password": "Securepassword123"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Login / logout
// ===========================================================================

#[tokio::test]
async fn login_sets_session_cookie() {
    let app = app().await;
    let user = app.create_user("login_ok").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.email, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let token = resp.session_cookie().expect("session cookie missing");
    assert!(!token.is_empty());

    // The issued cookie authenticates subsequent requests.
    let cookie = format!("vt_session={}", token);
    let me = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["id"].as_i64().unwrap(), user.id);
}

#[tokio::test]
async fn login_accepts_username_as_identifier() {
    let app = app().await;
    let user = app.create_user("login_uname").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.username, "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn login_wrong_password() {
    let app = app().await;
    let user = app.create_user("login_badpw").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "email": user.email, "password": "wrongpassword" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn login_unknown_user() {
    let app = app().await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "email": "ghost@example.com", "password": "Securepassword123" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = app().await;
    let user = app.create_user("logout").await;

    let resp = app.post_empty("/api/auth/logout", Some(&user.cookie)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    // The revoked session no longer authenticates.
    let me = app.get("/api/auth/me", Some(&user.cookie)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_a_session() {
    let app = app().await;

    let resp = app.get("/api/auth/me", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .get("/api/auth/me", Some("vt_session=not-a-real-token"))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// IP rate limiting
// ===========================================================================

#[tokio::test]
async fn login_is_rate_limited_per_ip() {
    let app = app().await;
    let user = app.create_user("ratelimit").await;
    // Dedicated address so other tests never share this counter.
    let addr: SocketAddr = "127.200.0.1:0".parse().unwrap();

    let mut last_status = StatusCode::OK;
    for _ in 0..11 {
        let resp = app
            .request_from_ip(
                Method::POST,
                "/api/auth/login",
                Some(json!({ "email": user.email, "password": "wrongpassword" })),
                &[],
                addr,
            )
            .await;
        last_status = resp.status;
    }

    assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
}
