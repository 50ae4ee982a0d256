//! # Business API
//!
//! Every route acts on behalf of the user named by the `x-user-id` header
//! and only ever sees businesses that user is a member of. A Business the
//! caller cannot see answers 404, the same as one that does not exist.
//!
//! Writes carry the version the caller last read. A stale version answers
//! 409 and the caller is expected to re-read and retry.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use bizreg_core::{
    Business, BusinessDraft, BusinessFilter, BusinessId, Filters, Metadata, UserId,
    BUSINESS_SORT_SAFELIST,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{extract_json, ActingUser};
use crate::state::AppState;

/// Query string accepted by the listing route.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub name: String,
    pub email: String,
    pub cnpj: String,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<String>,
}

impl ListQuery {
    fn split(self) -> (BusinessFilter, Filters) {
        let defaults = Filters::default();
        let filters = Filters {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
            sort: self.sort.unwrap_or(defaults.sort),
        };
        let filter = BusinessFilter {
            name: self.name,
            email: self.email,
            cnpj: self.cnpj,
        };
        (filter, filters)
    }
}

/// Body of a Business update.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub version: i32,
    #[serde(flatten)]
    pub draft: BusinessDraft,
}

/// Query string carrying the expected version of a delete.
#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub version: i32,
}

/// Body of a membership grant.
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
    pub version: i32,
}

/// `{"business": ...}` envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct BusinessEnvelope {
    pub business: Business,
}

/// One page of businesses.
#[derive(Debug, Serialize, Deserialize)]
pub struct BusinessPage {
    pub business: Vec<Business>,
    pub metadata: Metadata,
}

/// Member ids of a Business.
#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    pub members: Vec<UserId>,
}

/// Acknowledgement of a delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Build the businesses router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/business", get(list_businesses).post(create_business))
        .route(
            "/v1/business/:id",
            get(get_business).put(update_business).delete(delete_business),
        )
        .route("/v1/business/:id/members", get(list_members).post(add_member))
        .route("/v1/business/:id/members/:user_id", delete(remove_member))
}

fn business_id(path: Result<Path<i64>, PathRejection>) -> Result<BusinessId, AppError> {
    let Path(id) = path.map_err(|e| AppError::BadRequest(e.body_text()))?;
    positive(id).map(BusinessId::new)
}

fn positive(id: i64) -> Result<i64, AppError> {
    if id < 1 {
        return Err(AppError::BadRequest("invalid id parameter".to_string()));
    }
    Ok(id)
}

fn query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(q)| q)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

/// GET /v1/business: List the caller's businesses with filtering and paging.
async fn list_businesses(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    params: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<BusinessPage>, AppError> {
    let (filter, filters) = query(params)?.split();
    let page = filters.validate(BUSINESS_SORT_SAFELIST)?;

    let (business, metadata) = state.store.list_businesses(filter, page, actor).await?;
    Ok(Json(BusinessPage { business, metadata }))
}

/// POST /v1/business: Create a Business with the caller as its first member.
async fn create_business(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    body: Result<Json<BusinessDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<BusinessEnvelope>), AppError> {
    let draft = extract_json(body)?;
    let business = state.store.create_business(draft, actor).await?;
    Ok((StatusCode::CREATED, Json(BusinessEnvelope { business })))
}

/// GET /v1/business/:id: Read one Business.
async fn get_business(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<BusinessEnvelope>, AppError> {
    let id = business_id(id)?;
    let business = state.store.business_for_member(id, actor).await?;
    Ok(Json(BusinessEnvelope { business }))
}

/// PUT /v1/business/:id: Replace a Business's fields at a known version.
async fn update_business(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<BusinessEnvelope>, AppError> {
    let id = business_id(id)?;
    let req = extract_json(body)?;
    let business = state
        .store
        .update_business(id, req.version, req.draft, actor)
        .await?;
    Ok(Json(BusinessEnvelope { business }))
}

/// DELETE /v1/business/:id?version=N: Tombstone a Business.
async fn delete_business(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    id: Result<Path<i64>, PathRejection>,
    version: Result<Query<VersionQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = business_id(id)?;
    let VersionQuery { version } = query(version)?;
    state.store.delete_business(id, version, actor).await?;
    Ok(Json(MessageResponse {
        message: "business successfully deleted".to_string(),
    }))
}

/// GET /v1/business/:id/members: Member ids of a Business.
async fn list_members(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MembersResponse>, AppError> {
    let id = business_id(id)?;
    let members = state.store.members_of(id, actor).await?;
    Ok(Json(MembersResponse { members }))
}

/// POST /v1/business/:id/members: Grant another user access.
async fn add_member(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<AddMemberRequest>, JsonRejection>,
) -> Result<Json<BusinessEnvelope>, AppError> {
    let id = business_id(id)?;
    let req = extract_json(body)?;
    let member = UserId::new(positive(req.user_id)?);
    let business = state
        .store
        .add_member(id, req.version, member, actor)
        .await?;
    Ok(Json(BusinessEnvelope { business }))
}

/// DELETE /v1/business/:id/members/:user_id?version=N: Revoke access.
async fn remove_member(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    ids: Result<Path<(i64, i64)>, PathRejection>,
    version: Result<Query<VersionQuery>, QueryRejection>,
) -> Result<Json<BusinessEnvelope>, AppError> {
    let Path((id, member)) = ids.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let id = BusinessId::new(positive(id)?);
    let member = UserId::new(positive(member)?);
    let VersionQuery { version } = query(version)?;
    let business = state
        .store
        .remove_member(id, version, member, actor)
        .await?;
    Ok(Json(BusinessEnvelope { business }))
}
