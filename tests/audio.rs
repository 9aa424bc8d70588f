//! Audio generation and file management tests
//!
//! The provider is scripted (see common), so generation runs without a
//! network: any text containing the failure marker simulates an outage.

mod common;

use axum::http::StatusCode;
use common::{app, FAILING_TEXT_MARKER, FAKE_AUDIO};
use serde_json::json;

const RACHEL: &str = "21m00Tcm4TlvDq8ikWAM";

// ===========================================================================
// Generation
// ===========================================================================

#[tokio::test]
async fn generate_creates_row_file_and_notification() {
    let app = app().await;
    let user = app.create_user("gen_ok").await;

    let resp = app
        .post_json(
            "/api/audio",
            json!({ "voice_id": RACHEL, "text": "Hello from the test suite." }),
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["voice_name"].as_str().unwrap(), "Rachel");
    assert_eq!(body["char_count"].as_i64().unwrap(), 26);
    assert_eq!(body["bytes"].as_i64().unwrap(), FAKE_AUDIO.len() as i64);

    // The bytes are downloadable.
    let download = app
        .get(&format!("/api/audio/{}/download", id), Some(&user.cookie))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(
        download
            .headers
            .get("content-type")
            .and_then(|value| value.to_str().ok()),
        Some("audio/mpeg")
    );
    assert_eq!(download.body(), FAKE_AUDIO);

    // An audio notification was emitted with the file id in its metadata.
    let unread = app
        .get("/api/notifications?unread=true", Some(&user.cookie))
        .await;
    let items = unread.json()["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"].as_str().unwrap(), "audio");
    assert_eq!(items[0]["metadata"]["audio_id"].as_str().unwrap(), id);
}

#[tokio::test]
async fn generate_with_unknown_voice_is_rejected() {
    let app = app().await;
    let user = app.create_user("gen_badvoice").await;

    let resp = app
        .post_json(
            "/api/audio",
            json!({ "voice_id": "no-such-voice", "text": "Hello" }),
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "unknown voice");
}

#[tokio::test]
async fn generate_provider_failure_is_a_502_and_leaves_no_row() {
    let app = app().await;
    let user = app.create_user("gen_outage").await;

    let resp = app
        .post_json(
            "/api/audio",
            json!({ "voice_id": RACHEL, "text": format!("Hi {}", FAILING_TEXT_MARKER) }),
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_GATEWAY);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_files WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn generate_enforces_the_monthly_quota() {
    let app = app().await;
    let user = app.create_user("gen_quota").await;

    // Free tier allows 10k characters per month; burn almost all of it.
    app.create_audio_file(user.id, 9_990).await;

    let resp = app
        .post_json(
            "/api/audio",
            json!({ "voice_id": RACHEL, "text": "x".repeat(100) }),
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.error_message().contains("quota"));

    // Only the seeded row exists.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_files WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn generate_rejects_oversized_text() {
    let app = app().await;
    let user = app.create_user_with_role("gen_long", "user", "pro").await;

    let resp = app
        .post_json(
            "/api/audio",
            json!({ "voice_id": RACHEL, "text": "x".repeat(5001) }),
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Listing + deletion
// ===========================================================================

#[tokio::test]
async fn list_is_scoped_to_the_owner() {
    let app = app().await;
    let user = app.create_user("audio_list").await;
    let other = app.create_user("audio_list_other").await;

    app.create_audio_file(user.id, 10).await;
    app.create_audio_file(user.id, 10).await;
    app.create_audio_file(other.id, 10).await;

    let resp = app.get("/api/audio", Some(&user.cookie)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let items = resp.json()["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 2);
    for item in &items {
        assert_eq!(item["user_id"].as_i64().unwrap(), user.id);
    }
}

#[tokio::test]
async fn get_foreign_audio_is_not_found() {
    let app = app().await;
    let owner = app.create_user("audio_owner").await;
    let intruder = app.create_user("audio_intruder").await;
    let id = app.create_audio_file(owner.id, 10).await;

    let resp = app
        .get(&format!("/api/audio/{}", id), Some(&intruder.cookie))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_row_and_bytes() {
    let app = app().await;
    let user = app.create_user("audio_delete").await;
    let id = app.create_audio_file(user.id, 10).await;

    let resp = app
        .delete(&format!("/api/audio/{}", id), Some(&user.cookie))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_files WHERE id = $1")
        .bind(id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);

    let download = app
        .get(&format!("/api/audio/{}/download", id), Some(&user.cookie))
        .await;
    assert_eq!(download.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_user_cascades_to_audio_rows() {
    let app = app().await;
    let user = app.create_user("audio_cascade").await;
    app.create_audio_file(user.id, 10).await;
    app.create_audio_file(user.id, 10).await;

    let resp = app.delete("/api/account", Some(&user.cookie)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audio_files WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

// ===========================================================================
// Voices
// ===========================================================================

#[tokio::test]
async fn voice_catalog_is_served() {
    let app = app().await;
    let user = app.create_user("voices").await;

    let resp = app.get("/api/voices", Some(&user.cookie)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let voices = resp.json();
    let voices = voices.as_array().unwrap();
    assert!(voices.iter().any(|v| v["id"] == RACHEL));
    assert!(voices.len() >= 6);
}
