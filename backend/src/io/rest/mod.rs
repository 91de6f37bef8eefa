//! # REST API Interface Layer
//!
//! HTTP endpoints for the billing ledger. This layer handles:
//! - Request/response serialization via the `shared` DTOs
//! - Mapping DTOs onto internal domain commands
//! - Translating domain errors to HTTP status codes
//!
//! Business logic lives in the domain services; handlers here only
//! translate and log.

pub mod archive_apis;
pub mod mappers;
pub mod member_apis;
pub mod receipt_apis;
pub mod subscription_apis;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::domain::LedgerError;
use shared::ApiResponse;

/// Map a domain failure to an HTTP response carrying the error envelope
pub(crate) fn error_response(err: LedgerError) -> Response {
    let status = match &err {
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::Conflict(_) => StatusCode::CONFLICT,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::<()>::err(err.to_string()))).into_response()
}
