//! Service banner, health check and the OpenAPI document.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::warn;
use utoipa::OpenApi;

use dropnote_core::logging::{ERROR_MSG, SUBSYSTEM};

use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::AppState;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    /// `connected` or `disconnected`.
    pub database_status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Banner with a live database probe. Always 200; a failed probe is
/// reported in the body.
#[utoipa::path(get, path = "/", tag = "System",
    responses((status = 200, description = "Service banner", body = RootResponse)))]
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let database_status = match state.notes.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!({ SUBSYSTEM } = "api", { ERROR_MSG } = %e, "Database probe failed");
            "disconnected"
        }
    };

    Json(RootResponse {
        message: "Welcome to the DropNote API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database_status: database_status.to_string(),
    })
}

#[utoipa::path(get, path = "/health", tag = "System",
    responses((status = 200, description = "Service is up", body = HealthResponse)))]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Fallback for paths no route matches.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
