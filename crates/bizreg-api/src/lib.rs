//! # bizreg-api: Axum API for the Business Registry
//!
//! Users register, activate with a six-digit code, and manage Business
//! records shared among member users. Every business route is scoped to the
//! acting user's memberships; writes are optimistic and carry the version
//! the caller last read.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                   | Domain            |
//! |------------------------|--------------------------|-------------------|
//! | `/v1/users*`           | [`routes::users`]        | Accounts          |
//! | `/v1/business*`        | [`routes::businesses`]   | Business records  |
//! | `/v1/debug/vars`       | [`routes::debug`]        | Counters          |
//! | `/health/*`            | this module              | Health checks     |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → RateLimitMiddleware → CatchPanic → Handler
//! ```
//!
//! Health checks sit outside the stack and are never rate limited.

pub mod cli;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod state;

use std::any::Any;

use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::ErrorBody;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::users::router())
        .merge(routes::businesses::router())
        .merge(routes::debug::router())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(state.metrics.clone()))
        .layer(axum::Extension(state.admission.clone()))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// A handler panic becomes a 500 with the standard error body. The
/// connection is kept.
fn panic_response(cause: Box<dyn Any + Send + 'static>) -> Response {
    let detail = cause
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| cause.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("INTERNAL_ERROR", "An internal error occurred")),
    )
        .into_response()
}

/// Liveness check: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
