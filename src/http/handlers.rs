use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::audio::{AudioService, GenerateOutcome};
use crate::app::auth::{AuthService, IssuedSession, SignupOutcome};
use crate::app::notifications::{NewNotification, NotificationService};
use crate::app::quota::QuotaLimiter;
use crate::app::users::{ProfileUpdateOutcome, UserService};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::user::{PublicUser, SubscriptionTier, User, UserRole};
use crate::domain::audio::{AudioFile, Voice, VOICES};
use crate::http::auth::cookie_from_headers;
use crate::http::{AppError, AuthUser, AdminUser, SESSION_COOKIE};
use crate::AppState;

const MAX_PASSWORD_LEN: usize = 128;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub unread: Option<bool>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn split_cursor(cursor: &str) -> Result<(OffsetDateTime, &str), AppError> {
    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    Ok((timestamp, id))
}

fn parse_audio_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };
    let (timestamp, id) = split_cursor(&cursor)?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;
    Ok(Some((timestamp, id)))
}

fn parse_notification_cursor(
    cursor: Option<String>,
) -> Result<Option<(OffsetDateTime, i32)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };
    let (timestamp, id) = split_cursor(&cursor)?;
    let id: i32 = id.parse().map_err(|_| AppError::bad_request("invalid cursor"))?;
    Ok(Some((timestamp, id)))
}

fn encode_cursor(timestamp: OffsetDateTime, id: impl std::fmt::Display) -> Option<String> {
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

fn session_set_cookie(session: &IssuedSession) -> String {
    let max_age = (session.expires_at - OffsetDateTime::now_utc()).whole_seconds().max(0);
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session.token, max_age
    )
}

fn session_clear_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim().to_string();

    if email.is_empty() || username.is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("email, username and password are required"));
    }
    if !email.contains('@') {
        return Err(AppError::bad_request("invalid email address"));
    }
    if username.len() < 3 || username.len() > 32 {
        return Err(AppError::bad_request("username must be 3-32 characters"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::new(state.db.clone(), state.session_key, state.session_ttl_days);
    let outcome = service
        .signup(email, username, payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to sign up");
            AppError::internal("failed to sign up")
        })?;

    match outcome {
        SignupOutcome::Created(user) => Ok((StatusCode::CREATED, Json(user))),
        SignupOutcome::EmailTaken => Err(AppError::conflict("Email already registered")),
        SignupOutcome::UsernameTaken => Err(AppError::conflict("Username already taken")),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::new(state.db.clone(), state.session_key, state.session_ttl_days);
    let result = service
        .login(payload.email.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match result {
        Some((user, session)) => Ok((
            [(header::SET_COOKIE, session_set_cookie(&session))],
            Json(user),
        )),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = cookie_from_headers(&headers) {
        let service = AuthService::new(state.db.clone(), state.session_key, state.session_ttl_days);
        if let Err(err) = service.revoke_session(&token).await {
            tracing::error!(error = ?err, "failed to revoke session");
            return Err(AppError::internal("failed to log out"));
        }
    }

    Ok((
        [(header::SET_COOKIE, session_clear_cookie())],
        StatusCode::NO_CONTENT,
    ))
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = AuthService::new(state.db.clone(), state.session_key, state.session_ttl_days);
    let user = service
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch current user")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn get_user(
    _auth: AuthUser,
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service.get_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = id, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    match user {
        Some(user) => Ok(Json(user.into())),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let username = payload.username.map(|value| value.trim().to_string());
    let email = payload.email.map(|value| value.trim().to_lowercase());

    if let Some(username) = &username {
        if username.len() < 3 || username.len() > 32 {
            return Err(AppError::bad_request("username must be 3-32 characters"));
        }
    }
    if let Some(email) = &email {
        if !email.contains('@') {
            return Err(AppError::bad_request("invalid email address"));
        }
    }

    let service = UserService::new(state.db.clone());
    let outcome = service
        .update_profile(auth.user_id, username, email)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match outcome {
        ProfileUpdateOutcome::Updated(user) => Ok(Json(user)),
        ProfileUpdateOutcome::EmailTaken => Err(AppError::conflict("Email already registered")),
        ProfileUpdateOutcome::UsernameTaken => Err(AppError::conflict("Username already taken")),
        ProfileUpdateOutcome::NotFound => Err(AppError::not_found("user not found")),
    }
}

pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let users = UserService::new(state.db.clone());
    let keys = users.audio_keys(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = auth.user_id, "failed to collect audio keys");
        AppError::internal("failed to delete account")
    })?;

    let deleted = users.delete_account(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = auth.user_id, "failed to delete account");
        AppError::internal("failed to delete account")
    })?;

    if !deleted {
        return Err(AppError::not_found("user not found"));
    }

    let audio = AudioService::new(
        state.db.clone(),
        state.tts.clone(),
        state.audio_store.clone(),
        QuotaLimiter::new(state.cache.clone()),
        state.max_text_chars,
    );
    audio.remove_files(&keys).await;

    Ok((
        [(header::SET_COOKIE, session_clear_cookie())],
        StatusCode::NO_CONTENT,
    ))
}

// ---------------------------------------------------------------------------
// Voices + audio
// ---------------------------------------------------------------------------

pub async fn list_voices(_auth: AuthUser) -> Json<&'static [Voice]> {
    Json(VOICES)
}

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub voice_id: String,
    pub text: String,
    pub title: Option<String>,
}

pub async fn generate_audio(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.voice_id.trim().is_empty() || payload.text.trim().is_empty() {
        return Err(AppError::bad_request("voice_id and text are required"));
    }

    let users = UserService::new(state.db.clone());
    let user = users
        .get_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to load user");
            AppError::internal("failed to generate audio")
        })?
        .ok_or_else(|| AppError::unauthorized("session expired"))?;

    let service = AudioService::new(
        state.db.clone(),
        state.tts.clone(),
        state.audio_store.clone(),
        QuotaLimiter::new(state.cache.clone()),
        state.max_text_chars,
    );
    let outcome = service
        .generate(&user, payload.voice_id.trim(), &payload.text, payload.title)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = user.id, "failed to generate audio");
            AppError::internal("failed to generate audio")
        })?;

    match outcome {
        GenerateOutcome::Created(file) => Ok((StatusCode::CREATED, Json(file))),
        GenerateOutcome::UnknownVoice => Err(AppError::bad_request("unknown voice")),
        GenerateOutcome::TextTooLong { max } => Err(AppError::bad_request(format!(
            "text must be at most {} characters",
            max
        ))),
        GenerateOutcome::QuotaExceeded { used, quota } => Err(AppError::rate_limited(format!(
            "monthly character quota exceeded ({} of {} used)",
            used, quota
        ))),
        GenerateOutcome::RateLimited => Err(AppError::rate_limited(
            "generation rate limit reached, try again later",
        )),
        GenerateOutcome::ProviderFailed(err) => {
            tracing::error!(error = ?err, user_id = user.id, "voice provider call failed");
            Err(AppError::bad_gateway("voice provider unavailable"))
        }
    }
}

pub async fn list_audio(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<AudioFile>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=100).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }
    let cursor = parse_audio_cursor(query.cursor)?;

    let service = AudioService::new(
        state.db.clone(),
        state.tts.clone(),
        state.audio_store.clone(),
        QuotaLimiter::new(state.cache.clone()),
        state.max_text_chars,
    );
    let mut files = service
        .list(auth.user_id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to list audio files");
            AppError::internal("failed to list audio files")
        })?;

    let next_cursor = if files.len() > limit as usize {
        let last = files.pop().expect("checked len");
        encode_cursor(last.created_at, last.id)
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: files,
        next_cursor,
    }))
}

pub async fn get_audio(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<AudioFile>, AppError> {
    let service = AudioService::new(
        state.db.clone(),
        state.tts.clone(),
        state.audio_store.clone(),
        QuotaLimiter::new(state.cache.clone()),
        state.max_text_chars,
    );
    let file = service.get(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, audio_id = %id, "failed to fetch audio file");
        AppError::internal("failed to fetch audio file")
    })?;

    match file {
        Some(file) => Ok(Json(file)),
        None => Err(AppError::not_found("audio file not found")),
    }
}

pub async fn download_audio(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let service = AudioService::new(
        state.db.clone(),
        state.tts.clone(),
        state.audio_store.clone(),
        QuotaLimiter::new(state.cache.clone()),
        state.max_text_chars,
    );
    let file = service
        .get(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, audio_id = %id, "failed to fetch audio file");
            AppError::internal("failed to fetch audio file")
        })?
        .ok_or_else(|| AppError::not_found("audio file not found"))?;

    let data = service.read_bytes(&file).await.map_err(|err| {
        tracing::error!(error = ?err, audio_id = %id, "failed to read audio file");
        AppError::internal("failed to read audio file")
    })?;

    let disposition = format!(
        "attachment; filename=\"{}.mp3\"",
        file.title.replace(['"', '\\'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}

pub async fn delete_audio(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = AudioService::new(
        state.db.clone(),
        state.tts.clone(),
        state.audio_store.clone(),
        QuotaLimiter::new(state.cache.clone()),
        state.max_text_chars,
    );
    let deleted = service.delete(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, audio_id = %id, "failed to delete audio file");
        AppError::internal("failed to delete audio file")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("audio file not found"))
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Notification>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let unread_only = query.unread.unwrap_or(false);
    let cursor = parse_notification_cursor(query.cursor)?;

    let service = NotificationService::new(state.db.clone());
    let mut notifications = service
        .list(auth.user_id, unread_only, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    let next_cursor = if notifications.len() > limit as usize {
        let last = notifications.pop().expect("checked len");
        encode_cursor(last.created_at, last.id)
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: notifications,
        next_cursor,
    }))
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

pub async fn unread_notification_count(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let count = service.unread_count(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = auth.user_id, "failed to count unread notifications");
        AppError::internal("failed to count unread notifications")
    })?;

    Ok(Json(UnreadCountResponse { count }))
}

pub async fn mark_notification_read(
    auth: AuthUser,
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone());
    let updated = service.mark_read(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, notification_id = id, "failed to mark notification read");
        AppError::internal("failed to mark notification read")
    })?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("notification not found"))
    }
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AdminListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct AdminUserList {
    pub items: Vec<User>,
    pub next_offset: Option<i64>,
}

pub async fn admin_list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<AdminUserList>, AppError> {
    let limit = query.limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let offset = query.offset.unwrap_or(0).max(0);

    let service = UserService::new(state.db.clone());
    let mut users = service.list_users(offset, limit + 1).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list users");
        AppError::internal("failed to list users")
    })?;

    let next_offset = if users.len() > limit as usize {
        users.pop();
        Some(offset + limit)
    } else {
        None
    };

    Ok(Json(AdminUserList {
        items: users,
        next_offset,
    }))
}

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

pub async fn admin_set_role(
    admin: AdminUser,
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<Json<User>, AppError> {
    let role = UserRole::parse(&payload.role)
        .ok_or_else(|| AppError::bad_request("role must be one of: user, admin"))?;

    if id == admin.user.id && role != UserRole::Admin {
        return Err(AppError::bad_request("cannot remove your own admin role"));
    }

    let service = UserService::new(state.db.clone());
    let user = service.set_role(id, role).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = id, "failed to set role");
        AppError::internal("failed to set role")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct SetTierRequest {
    pub tier: String,
}

pub async fn admin_set_tier(
    _admin: AdminUser,
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<SetTierRequest>,
) -> Result<Json<User>, AppError> {
    let tier = SubscriptionTier::parse(&payload.tier)
        .ok_or_else(|| AppError::bad_request("tier must be one of: free, starter, pro"))?;

    let service = UserService::new(state.db.clone());
    let user = service.set_tier(id, tier).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = id, "failed to set tier");
        AppError::internal("failed to set tier")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct SendNotificationRequest {
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
}

pub async fn admin_send_notification(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<SendNotificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Reject anything outside the closed kind set before it can reach the
    // store; the CHECK constraint is the backstop, not the gate.
    let kind = NotificationKind::parse(&payload.kind).ok_or_else(|| {
        AppError::bad_request("kind must be one of: payment, user, system, audio")
    })?;

    if payload.title.trim().is_empty() || payload.message.trim().is_empty() {
        return Err(AppError::bad_request("title and message are required"));
    }

    let service = NotificationService::new(state.db.clone());
    let notification = service
        .create(NewNotification {
            user_id: payload.user_id,
            kind,
            title: payload.title,
            message: payload.message,
            metadata: payload.metadata,
        })
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = payload.user_id, "failed to create notification");
            AppError::internal("failed to create notification")
        })?;

    match notification {
        Some(notification) => Ok((StatusCode::CREATED, Json(notification))),
        None => Err(AppError::not_found("user not found")),
    }
}
