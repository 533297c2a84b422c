//! Request extractors whose rejections render as JSON errors.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;

pub(crate) const BODY_TOO_LARGE: &str = "Request body too large";

/// Request body that must be a JSON object.
///
/// Kept as a raw map so validation can tell absent fields from fields of
/// the wrong type.
#[derive(Debug)]
pub struct JsonObject(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| match rejection {
                JsonRejection::MissingJsonContentType(_) => {
                    ApiError::BadRequest("Request must be JSON".to_string())
                }
                // Bodies without a Content-Length hit the limit while buffering.
                rejection if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                    ApiError::PayloadTooLarge(BODY_TOO_LARGE.to_string())
                }
                _ => ApiError::BadRequest("Invalid JSON payload".to_string()),
            })?;

        match value {
            Value::Object(map) => Ok(JsonObject(map)),
            _ => Err(ApiError::BadRequest(
                "Request body must be a JSON object".to_string(),
            )),
        }
    }
}

/// Note id taken from the `:id` path segment.
#[derive(Debug, Clone, Copy)]
pub struct NoteId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for NoteId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::BadRequest("Invalid note id".to_string()))?;
        Uuid::parse_str(&raw)
            .map(NoteId)
            .map_err(|_| ApiError::BadRequest("Invalid note id".to_string()))
    }
}
