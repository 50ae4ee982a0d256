//! # Per-Client Rate Limiting
//!
//! Consults the [`AdmissionRegistry`] before any handler work. The client
//! identifier is the host part of the connection's remote address.
//!
//! A request whose remote address cannot be resolved is a server fault
//! (500), reported distinctly from a rejection (429).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bizreg_admission::{client_id_from_remote_addr, AdmissionRegistry};

use crate::error::AppError;

/// Middleware that enforces per-client admission.
///
/// The registry is read from request extensions. When it is absent or
/// disabled every request passes through.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let registry = request.extensions().get::<Arc<AdmissionRegistry>>().cloned();

    if let Some(registry) = registry.filter(|r| r.is_enabled()) {
        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        let client_id = match client_id_from_remote_addr(&remote) {
            Ok(id) => id,
            Err(err) => return AppError::from(err).into_response(),
        };

        if !registry.allow(&client_id) {
            tracing::debug!(client_id = %client_id, "request rejected by rate limiter");
            return AppError::RateLimited.into_response();
        }
    }

    next.run(request).await
}
