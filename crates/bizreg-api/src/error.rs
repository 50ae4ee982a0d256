//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps the domain error set from bizreg-core, store faults, and admission
//! faults to HTTP status codes with JSON bodies carrying an error code,
//! a message, and per-field details for validation failures. Server-side
//! faults never expose their cause to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bizreg_admission::AdmissionError;
use bizreg_core::{DomainError, ValidationErrors};
use bizreg_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
///
/// The `details` field carries per-field messages for 422 responses and is
/// omitted for everything else.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "EDIT_CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Field → message map, present only for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Body with no details.
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// No visible record (404). Also covers records the caller is not a
    /// member of.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Stale version (409).
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    /// Field validation or duplicate-value failure (422).
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Request could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No acting user on the request (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Client exceeded its admission rate (429).
    #[error("rate limit exceeded")]
    RateLimited,

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::EditConflict => (StatusCode::CONFLICT, "EDIT_CONFLICT"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if let Self::Internal(cause) = &self {
            tracing::error!(error = %cause, "internal server error");
        }

        let body = match self {
            Self::Validation(fields) => ErrorBody {
                error: ErrorDetail {
                    code: code.to_string(),
                    message: "the request failed validation".to_string(),
                    details: serde_json::to_value(&fields).ok(),
                },
            },
            Self::Internal(_) => ErrorBody::new(code, "An internal error occurred"),
            other => ErrorBody::new(code, other.to_string()),
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::RecordNotFound => Self::NotFound,
            DomainError::EditConflict => Self::EditConflict,
            DomainError::RateLimitExceeded => Self::RateLimited,
            DomainError::InvalidData(fields) => Self::Validation(fields),
            duplicate => {
                let mut fields = ValidationErrors::new();
                if let Some(field) = duplicate.duplicate_field() {
                    fields.add(field, &format!("a record with this {field} already exists"));
                }
                Self::Validation(fields)
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(domain) => domain.into(),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        Self::Internal(err.to_string())
    }
}
