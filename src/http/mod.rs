use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod middleware;
mod routes;

pub use auth::{AdminUser, AuthUser, SESSION_COOKIE};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::voices())
        .merge(routes::audio())
        .merge(routes::notifications())
        .merge(routes::admin())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::ip_rate_limit_middleware,
        ))
        .with_state(state)
}
