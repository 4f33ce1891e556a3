//! Error types for seis-gateway
//!
//! `ComputeError` is what the services return; `ApiError` is what the
//! HTTP handlers turn into responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of a segment, FK or beam operation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComputeError {
    /// A required feature measurement or parameter is absent; nothing was changed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The upstream compute service returned nothing usable; nothing was changed
    #[error("Empty result from {0}")]
    EmptyResult(String),

    /// A collaborator call failed at the transport or decoding level
    #[error("Collaborator {service} failed: {message}")]
    Collaborator { service: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ComputeError {
    pub fn collaborator(service: impl Into<String>, message: impl ToString) -> Self {
        ComputeError::Collaborator {
            service: service.into(),
            message: message.to_string(),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream service failure (502)
    #[error("Upstream failure: {0}")]
    BadGateway(String),

    /// Computation produced no result (422)
    #[error("No result: {0}")]
    NoResult(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// seis-common error
    #[error("Common error: {0}")]
    Common(#[from] seis_common::Error),
}

impl From<ComputeError> for ApiError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ComputeError::NotFound(msg) => ApiError::NotFound(msg),
            ComputeError::EmptyResult(_) => ApiError::NoResult(err.to_string()),
            ComputeError::Collaborator { .. } => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            ApiError::NoResult(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "NO_RESULT", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
