//! Public tag index.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

/// Distinct tags used by public notes.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TagsResponse {
    /// Sorted ascending, no duplicates.
    pub tags: Vec<String>,
}

#[utoipa::path(get, path = "/api/tags", tag = "Tags",
    responses(
        (status = 200, description = "Tags of public notes", body = TagsResponse),
        (status = 500, description = "Storage failure", body = crate::error::ErrorBody)))]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<TagsResponse>, ApiError> {
    let tags = state.notes.public_tags().await?;
    Ok(Json(TagsResponse { tags }))
}
