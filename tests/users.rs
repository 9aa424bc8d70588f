//! User profile and account lifecycle tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

// ===========================================================================
// Profiles
// ===========================================================================

#[tokio::test]
async fn public_profile_hides_the_email() {
    let app = app().await;
    let viewer = app.create_user("profile_viewer").await;
    let target = app.create_user("profile_target").await;

    let resp = app
        .get(&format!("/api/users/{}", target.id), Some(&viewer.cookie))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["username"].as_str().unwrap(), target.username);
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn missing_profile_is_not_found() {
    let app = app().await;
    let viewer = app.create_user("profile_404").await;

    let resp = app
        .get("/api/users/999999999", Some(&viewer.cookie))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_profile_changes_username() {
    let app = app().await;
    let user = app.create_user("update_name").await;

    let resp = app
        .patch_json(
            "/api/account",
            json!({ "username": "renamed_user" }),
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["username"].as_str().unwrap(), "renamed_user");
    // Untouched fields survive the partial update.
    assert_eq!(resp.json()["email"].as_str().unwrap(), user.email);
}

#[tokio::test]
async fn update_profile_rejects_taken_username() {
    let app = app().await;
    let user = app.create_user("update_dup_a").await;
    let other = app.create_user("update_dup_b").await;

    let resp = app
        .patch_json(
            "/api/account",
            json!({ "username": other.username }),
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn update_profile_rejects_invalid_email() {
    let app = app().await;
    let user = app.create_user("update_bademail").await;

    let resp = app
        .patch_json(
            "/api/account",
            json!({ "email": "nope" }),
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Account deletion
// ===========================================================================

#[tokio::test]
async fn delete_account_removes_user_and_sessions() {
    let app = app().await;
    let user = app.create_user("delete_full").await;
    app.create_notification(user.id, "system", false).await;
    app.create_audio_file(user.id, 10).await;

    let resp = app.delete("/api/account", Some(&user.cookie)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(users, 0);

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(sessions, 0);

    // The old cookie is dead.
    let me = app.get("/api/auth/me", Some(&user.cookie)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}
