use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::app::quota::QuotaLimiter;
use crate::config::limits::{RateWindow, LOGIN_ATTEMPTS_PER_HOUR, SIGNUPS_PER_DAY};
use crate::http::AppError;
use crate::AppState;

/// IP caps on the unauthenticated auth endpoints.
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    let method = request.method();

    let rate_limit_config = match (path, method.as_str()) {
        ("/api/auth/login", "POST") => Some(("login", LOGIN_ATTEMPTS_PER_HOUR, RateWindow::Hour)),
        ("/api/auth/signup", "POST") => Some(("signup", SIGNUPS_PER_DAY, RateWindow::Day)),
        _ => None,
    };

    let (action, limit, window) = match rate_limit_config {
        Some(config) => config,
        None => return Ok(next.run(request).await),
    };

    let ip = addr.ip().to_string();
    let limiter = QuotaLimiter::new(state.cache.clone());

    let limited = limiter
        .ip_limited(&ip, action, limit, window)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check IP rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if limited {
        tracing::warn!(ip, action, "IP rate limit exceeded");
        return Err(AppError::rate_limited(
            "Too many attempts from your IP address. Please try again later.",
        ));
    }

    if let Err(err) = limiter.record_ip(&ip, action, window).await {
        tracing::warn!(error = ?err, "failed to increment IP rate limit counter");
    }

    Ok(next.run(request).await)
}
