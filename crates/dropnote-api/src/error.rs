//! HTTP error mapping.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use dropnote_core::logging::{ERROR_MSG, SUBSYSTEM};
use dropnote_core::ValidationErrors;

/// JSON body of every error response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Per-field messages, present for validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(ValidationErrors),
    Forbidden(String),
    NotFound(String),
    PayloadTooLarge(String),
    TooManyRequests(String),
    /// Storage failure. Logged in full, reported generically.
    Database(dropnote_core::Error),
    /// Anything else unexpected. Logged in full, reported generically.
    Internal(String),
}

impl From<dropnote_core::Error> for ApiError {
    fn from(err: dropnote_core::Error) -> Self {
        use dropnote_core::Error;

        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Validation(errors) => ApiError::Validation(errors),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::CapacityReached { .. } => ApiError::Forbidden("Note limit reached".to_string()),
            Error::Database(_) => ApiError::Database(err),
            Error::Config(msg) | Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Validation(errors) => {
                let details = errors
                    .fields()
                    .map(|(field, msg)| (field.to_string(), msg.to_string()))
                    .collect();
                (StatusCode::BAD_REQUEST, errors.to_string(), Some(details))
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg, None),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg, None),
            ApiError::Database(err) => {
                error!({ SUBSYSTEM } = "api", { ERROR_MSG } = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred.".to_string(),
                    None,
                )
            }
            ApiError::Internal(msg) => {
                error!({ SUBSYSTEM } = "api", { ERROR_MSG } = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                details,
            }),
        )
            .into_response()
    }
}
