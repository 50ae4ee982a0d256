//! # Custom Extractors
//!
//! [`ActingUser`] identifies the user on whose behalf a request acts, and
//! [`extract_json`] maps body rejections to [`AppError::BadRequest`].
//!
//! Token verification is an upstream concern: a gateway authenticates the
//! caller and forwards the resolved user id in the `x-user-id` header.

use axum::extract::rejection::JsonRejection;
use axum::http::request::Parts;
use axum::Json;
use bizreg_core::UserId;

use crate::error::AppError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user a request acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub UserId);

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for ActingUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?;
        raw.to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| Self(UserId::new(id)))
            .ok_or_else(|| AppError::Unauthorized(format!("malformed {USER_ID_HEADER} header")))
    }
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}
