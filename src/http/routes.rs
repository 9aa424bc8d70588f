use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/api/users/:id", get(handlers::get_user))
        .route("/api/account", patch(handlers::update_profile))
        .route("/api/account", delete(handlers::delete_account))
}

pub fn voices() -> Router<AppState> {
    Router::new().route("/api/voices", get(handlers::list_voices))
}

pub fn audio() -> Router<AppState> {
    Router::new()
        .route("/api/audio", post(handlers::generate_audio))
        .route("/api/audio", get(handlers::list_audio))
        .route("/api/audio/:id", get(handlers::get_audio))
        .route("/api/audio/:id", delete(handlers::delete_audio))
        .route("/api/audio/:id/download", get(handlers::download_audio))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(handlers::list_notifications))
        .route(
            "/api/notifications/unread-count",
            get(handlers::unread_notification_count),
        )
        .route(
            "/api/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(handlers::admin_list_users))
        .route("/api/admin/users/:id/role", patch(handlers::admin_set_role))
        .route("/api/admin/users/:id/tier", patch(handlers::admin_set_tier))
        .route(
            "/api/admin/notifications",
            post(handlers::admin_send_notification),
        )
}
