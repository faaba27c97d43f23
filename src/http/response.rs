//! Mapping of handler errors to HTTP responses.
//!
//! # Design Decisions
//! - 405 and 404 answer with short plain-text bodies; body validation
//!   errors are JSON with details
//! - Internal errors are logged and never echoed to the client

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::profile::StoreError;

/// Error returned by the profile handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed { allow: &'static str },

    #[error("Not found")]
    NotFound,

    #[error("Unsupported media type")]
    UnsupportedMediaType,

    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    #[error("Invalid profile")]
    InvalidProfile(Vec<String>),

    #[error("Precondition failed")]
    PreconditionFailed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::PreconditionFailed => ApiError::PreconditionFailed,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MethodNotAllowed { allow } => (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, allow)],
                "Method not allowed",
            )
                .into_response(),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            ApiError::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Expected application/json or application/ld+json",
            )
                .into_response(),
            ApiError::MalformedJson(detail) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "malformed JSON", "details": [detail] })),
            )
                .into_response(),
            ApiError::InvalidProfile(details) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "invalid profile", "details": details })),
            )
                .into_response(),
            ApiError::PreconditionFailed => {
                (StatusCode::PRECONDITION_FAILED, "Precondition failed").into_response()
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
