//! Admin gate and admin surface tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

// ===========================================================================
// The gate itself
// ===========================================================================

#[tokio::test]
async fn admin_routes_reject_anonymous_callers() {
    let app = app().await;

    let resp = app.get("/api/admin/users", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = app().await;
    let user = app.create_user("gate_regular").await;

    let resp = app.get("/api/admin/users", Some(&user.cookie)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "admin access required");
}

#[tokio::test]
async fn admin_routes_admit_admins() {
    let app = app().await;
    let admin = app.create_admin("gate_admin").await;

    let resp = app.get("/api/admin/users", Some(&admin.cookie)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["items"].is_array());
}

#[tokio::test]
async fn a_revoked_admin_session_is_rejected() {
    let app = app().await;
    let admin = app.create_admin("gate_revoked").await;

    let resp = app.post_empty("/api/auth/logout", Some(&admin.cookie)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get("/api/admin/users", Some(&admin.cookie)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// User management
// ===========================================================================

#[tokio::test]
async fn admin_can_promote_a_user() {
    let app = app().await;
    let admin = app.create_admin("promote_admin").await;
    let user = app.create_user("promote_target").await;

    let resp = app
        .patch_json(
            &format!("/api/admin/users/{}/role", user.id),
            json!({ "role": "admin" }),
            Some(&admin.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["role"].as_str().unwrap(), "admin");
}

#[tokio::test]
async fn admin_cannot_demote_themselves() {
    let app = app().await;
    let admin = app.create_admin("self_demote").await;

    let resp = app
        .patch_json(
            &format!("/api/admin/users/{}/role", admin.id),
            json!({ "role": "user" }),
            Some(&admin.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn role_update_rejects_unknown_roles() {
    let app = app().await;
    let admin = app.create_admin("role_bad_admin").await;
    let user = app.create_user("role_bad_target").await;

    let resp = app
        .patch_json(
            &format!("/api/admin/users/{}/role", user.id),
            json!({ "role": "superuser" }),
            Some(&admin.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tier_change_notifies_the_user_with_a_payment_notification() {
    let app = app().await;
    let admin = app.create_admin("tier_admin").await;
    let user = app.create_user("tier_target").await;

    let resp = app
        .patch_json(
            &format!("/api/admin/users/{}/tier", user.id),
            json!({ "tier": "pro" }),
            Some(&admin.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["tier"].as_str().unwrap(), "pro");

    let unread = app
        .get("/api/notifications?unread=true", Some(&user.cookie))
        .await;
    let items = unread.json()["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"].as_str().unwrap(), "payment");
    assert_eq!(items[0]["metadata"]["tier"].as_str().unwrap(), "pro");
}

#[tokio::test]
async fn tier_update_for_missing_user_is_not_found() {
    let app = app().await;
    let admin = app.create_admin("tier_missing_admin").await;

    let resp = app
        .patch_json(
            "/api/admin/users/999999999/tier",
            json!({ "tier": "pro" }),
            Some(&admin.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Admin-composed notifications
// ===========================================================================

#[tokio::test]
async fn admin_can_send_a_notification() {
    let app = app().await;
    let admin = app.create_admin("send_admin").await;
    let user = app.create_user("send_target").await;

    let resp = app
        .post_json(
            "/api/admin/notifications",
            json!({
                "user_id": user.id,
                "kind": "system",
                "title": "Maintenance",
                "message": "Scheduled downtime on Saturday.",
                "metadata": { "window": "02:00-04:00" }
            }),
            Some(&admin.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["user_id"].as_i64().unwrap(), user.id);
    assert_eq!(body["kind"].as_str().unwrap(), "system");
    assert_eq!(body["is_read"].as_bool().unwrap(), false);

    let listed = app.get("/api/notifications", Some(&user.cookie)).await;
    assert_eq!(listed.json()["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn sending_to_a_missing_user_is_not_found() {
    let app = app().await;
    let admin = app.create_admin("send_missing_admin").await;

    let resp = app
        .post_json(
            "/api/admin/notifications",
            json!({
                "user_id": 999999999,
                "kind": "system",
                "title": "Hello",
                "message": "World"
            }),
            Some(&admin.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
