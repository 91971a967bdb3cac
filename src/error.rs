//! Error types for the REST API.

use crate::response::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;


/// Field-level validation details, keyed by field name.
pub type FieldErrors = BTreeMap<String, String>;

/// Rate limit details carried in the `data` field of a 429 envelope.
#[derive(Debug, Serialize)]
pub struct RateLimitDetails {
    /// Maximum requests allowed in the exceeded window.
    pub limit: u32,
    /// Remaining requests.
    pub remaining: u32,
    /// Unix timestamp when the exceeded window resets.
    pub reset: u64,
    /// Seconds until the request may be retried.
    pub retry_after: u64,
}

/// API error types.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or out-of-range input.
    #[error("{message}")]
    Validation {
        /// Summary message.
        message: String,
        /// Per-field details.
        fields: FieldErrors,
    },

    /// Generic client error.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A write would break a data invariant (e.g. a port linked to itself).
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded {
        /// Maximum requests allowed.
        limit: u32,
        /// Remaining requests (always 0 when exceeded).
        remaining: u32,
        /// Unix timestamp when the rate limit resets.
        reset: u64,
        /// Seconds until reset.
        retry_after: u64,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// A dependency of the service is unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    /// Builds a validation error without field details.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    /// Builds a validation error for a single field.
    pub fn field(field: impl Into<String>, detail: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), detail.into());
        ApiError::Validation {
            message: "Validation failed".to_string(),
            fields,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) | ApiError::DataIntegrity(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::RateLimitExceeded {
                limit,
                remaining,
                reset,
                retry_after,
            } => {
                let body = ApiResponse::error(
                    status,
                    "Too many requests",
                    Some(RateLimitDetails {
                        limit,
                        remaining,
                        reset,
                        retry_after,
                    }),
                );

                (
                    [
                        ("X-RateLimit-Limit", limit.to_string()),
                        ("X-RateLimit-Remaining", remaining.to_string()),
                        ("X-RateLimit-Reset", reset.to_string()),
                        ("Retry-After", retry_after.to_string()),
                    ],
                    body,
                )
                    .into_response()
            }
            ApiError::Validation { message, fields } => {
                let data = if fields.is_empty() { None } else { Some(fields) };
                ApiResponse::error(status, message, data).into_response()
            }
            ApiError::Database(detail) | ApiError::Internal(detail) => {
                // Callers only ever see the generic message.
                error!(error = %detail, "request failed with an internal error");
                ApiResponse::<()>::error(status, "Internal server error", None).into_response()
            }
            other => ApiResponse::<()>::error(status, other.to_string(), None).into_response(),
        }
    }
}

impl From<crate::db::StoreError> for ApiError {
    fn from(err: crate::db::StoreError) -> Self {
        use crate::db::StoreError;
        match err {
            StoreError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} {} does not exist", entity, id))
            }
            StoreError::Conflict(msg) => ApiError::BadRequest(msg),
            StoreError::DataIntegrity(msg) => ApiError::DataIntegrity(msg),
            StoreError::Database(msg) => ApiError::Database(msg),
        }
    }
}
