use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::auth::AuthService;
use crate::domain::user::{User, UserRole};
use crate::http::AppError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "vt_session";

/// An authenticated request. Resolves the session cookie against the
/// sessions table; handlers taking this never run for anonymous callers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
}

/// The admin gate: authentication plus a role check. Handlers taking this
/// produce nothing until both have resolved, so there is no window in which
/// admin data is returned to a caller whose session is still unverified.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: User,
}

pub(crate) fn cookie_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

fn session_cookie(parts: &Parts) -> Option<String> {
    cookie_from_headers(&parts.headers)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_cookie(parts)
            .ok_or_else(|| AppError::unauthorized("not signed in"))?;

        let service = AuthService::new(state.db.clone(), state.session_key, state.session_ttl_days);
        let session = service
            .authenticate(&token)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to authenticate session");
                AppError::internal("failed to authenticate")
            })?;

        let session = session.ok_or_else(|| AppError::unauthorized("session expired"))?;
        Ok(AuthUser {
            user_id: session.user_id,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;

        let service = AuthService::new(state.db.clone(), state.session_key, state.session_ttl_days);
        let user = service
            .get_current_user(auth.user_id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = auth.user_id, "failed to load user for admin check");
                AppError::internal("failed to authenticate")
            })?
            .ok_or_else(|| AppError::unauthorized("session expired"))?;

        if user.role != UserRole::Admin {
            return Err(AppError::forbidden("admin access required"));
        }

        Ok(AdminUser { user })
    }
}
