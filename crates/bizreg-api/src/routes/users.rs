//! # User API
//!
//! Account registration, activation by six-digit code, and a read of the
//! acting user's own account.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use bizreg_core::{ActivationCode, DomainError, NewUser, User, UserId, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{extract_json, ActingUser};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 72;

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// Activation request.
#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub email: String,
    pub code: u32,
}

/// Public view of a user. Never carries the password hash or the pending
/// activation code.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub activated: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            activated: user.activated,
            version: user.audit.version,
            created_at: user.audit.created_at,
        }
    }
}

/// `{"user": ...}` envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(register))
        .route("/v1/users/activated", put(activate))
        .route("/v1/users/me", get(me))
}

/// POST /v1/users: Register an inactive account.
async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserEnvelope>), AppError> {
    let req = extract_json(body)?;

    let mut v = ValidationErrors::new();
    v.check(!req.password.is_empty(), "password", "must be provided");
    v.check(
        req.password.len() >= MIN_PASSWORD_LEN,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        req.password.len() <= MAX_PASSWORD_LEN,
        "password",
        "must not be more than 72 bytes long",
    );
    v.into_result()?;

    let user = NewUser {
        name: req.name,
        email: req.email,
        phone: req.phone,
        password_hash: state.hasher.hash(&req.password),
    };
    let created = state.store.register_user(user).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            user: created.into(),
        }),
    ))
}

/// PUT /v1/users/activated: Redeem an activation code.
async fn activate(
    State(state): State<AppState>,
    body: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let req = extract_json(body)?;
    let code = ActivationCode::new(req.code)
        .ok_or_else(|| DomainError::invalid("code", "must be 6 digits long"))?;

    let user = state.store.activate_user(code, &req.email).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}

/// GET /v1/users/me: The acting user's account.
async fn me(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = state.store.user_by_id(actor).await?;
    Ok(Json(UserEnvelope { user: user.into() }))
}
