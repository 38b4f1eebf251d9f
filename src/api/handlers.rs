use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::{CreateLinkRequest, ShortLink};
use crate::service::{LinkService, ServiceError, ShortenedLink, ValidationError};

/// Header carrying the caller's account id, set by the auth layer in front of the API
pub const OWNER_HEADER: &str = "x-owner-id";

pub struct AppState {
    pub service: Arc<LinkService>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn service_error(err: ServiceError) -> ApiError {
    let status = match &err {
        ServiceError::Validation(ValidationError::CodeTaken(_)) => StatusCode::CONFLICT,
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound => StatusCode::NOT_FOUND,
        ServiceError::NotOwner => StatusCode::FORBIDDEN,
        ServiceError::StorageUnavailable(inner) => {
            tracing::error!(error = %inner, "storage unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    error_response(status, err.to_string())
}

/// Owner id from the request, if the caller is signed in
pub fn owner_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn require_owner(headers: &HeaderMap) -> Result<String, ApiError> {
    owner_id(headers).ok_or_else(|| {
        error_response(
            StatusCode::UNAUTHORIZED,
            format!("missing {OWNER_HEADER} header"),
        )
    })
}

/// Create a new short link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<ShortenedLink>), ApiError> {
    let owner = owner_id(&headers);
    state
        .service
        .shorten(&payload.url, payload.custom_alias.as_deref(), owner.as_deref())
        .await
        .map(|created| (StatusCode::CREATED, Json(created)))
        .map_err(service_error)
}

/// List the caller's links, newest first
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ShortLink>>, ApiError> {
    let owner = require_owner(&headers)?;
    state
        .service
        .list_for_owner(&owner)
        .await
        .map(Json)
        .map_err(service_error)
}

/// Delete one of the caller's links
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let owner = require_owner(&headers)?;
    state
        .service
        .remove(&id, Some(&owner))
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(service_error)
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
