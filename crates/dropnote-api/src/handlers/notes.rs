//! Note HTTP handlers.
//!
//! Reads are open to everyone. Writes are authorized solely by the note's
//! modification code, which is handed out once in the create response.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use dropnote_core::logging::{COMPONENT, NOTE_ID, OPERATION, RESULT_COUNT, SUBSYSTEM};
use dropnote_core::{
    validate_new_note, validate_note_changes, CreatedNote, Error, ListPublicNotesRequest, Note,
    Pagination,
};

use crate::error::ApiError;
use crate::extract::{JsonObject, NoteId};
use crate::AppState;

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

/// Listing query. Values are parsed leniently: anything unparsable falls
/// back to its default instead of failing the request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListNotesQuery {
    /// Page number, from 1.
    pub page: Option<String>,
    /// Page size, 1 to 100.
    pub limit: Option<String>,
    /// Only notes carrying this exact tag.
    pub tag: Option<String>,
    /// Case-insensitive substring of title or content.
    pub search: Option<String>,
    /// One of `updated_at_desc` (default), `updated_at_asc`,
    /// `created_at_desc`, `created_at_asc`, `title_asc`, `title_desc`.
    pub sort: Option<String>,
}

impl ListNotesQuery {
    fn into_request(self) -> ListPublicNotesRequest {
        let number = |raw: Option<String>| raw.and_then(|v| v.trim().parse::<i64>().ok());
        let sort = self.sort;
        ListPublicNotesRequest::normalized(
            number(self.page),
            number(self.limit),
            self.tag,
            self.search,
            sort.as_deref(),
        )
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NoteListResponse {
    pub notes: Vec<Note>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BatchNotesResponse {
    pub notes: Vec<Note>,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Create a note and return it with its modification code.
#[utoipa::path(post, path = "/api/notes", tag = "Notes",
    request_body = crate::openapi::CreateNoteBody,
    responses(
        (status = 201, description = "Created", body = CreatedNote),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
        (status = 403, description = "Note limit reached", body = crate::error::ErrorBody),
        (status = 429, description = "Write quota exceeded", body = crate::error::ErrorBody)))]
pub async fn create_note(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> Result<(StatusCode, Json<CreatedNote>), ApiError> {
    let count = state.notes.count().await?;
    if count >= state.max_notes {
        warn!(
            { SUBSYSTEM } = "api",
            { COMPONENT } = "notes",
            { OPERATION } = "create",
            count,
            max_notes = state.max_notes,
            "Note limit reached"
        );
        return Err(Error::CapacityReached {
            limit: state.max_notes,
        }
        .into());
    }

    let note = validate_new_note(&body)?;
    // The early count keeps the 403 ahead of validation errors; the capped
    // insert enforces the limit atomically against concurrent creates.
    let created = state.notes.create_capped(note, state.max_notes).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// One page of public notes.
#[utoipa::path(get, path = "/api/notes", tag = "Notes",
    params(ListNotesQuery),
    responses((status = 200, description = "Public notes", body = NoteListResponse)))]
pub async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListNotesQuery>,
) -> Result<Json<NoteListResponse>, ApiError> {
    let req = query.into_request();
    let page = state.notes.list_public(&req).await?;

    Ok(Json(NoteListResponse {
        pagination: Pagination::new(&req, page.total),
        notes: page.notes,
    }))
}

/// A random public note.
#[utoipa::path(get, path = "/api/notes/random", tag = "Notes",
    responses(
        (status = 200, description = "A public note", body = Note),
        (status = 404, description = "No public notes", body = crate::error::ErrorBody)))]
pub async fn random_note(State(state): State<AppState>) -> Result<Json<Note>, ApiError> {
    state
        .notes
        .random_public()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No public notes found".to_string()))
}

/// Fetch a note by id, public or private.
#[utoipa::path(get, path = "/api/notes/{id}", tag = "Notes",
    params(("id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 200, description = "The note", body = Note),
        (status = 400, description = "Malformed id", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody)))]
pub async fn get_note(
    State(state): State<AppState>,
    NoteId(id): NoteId,
) -> Result<Json<Note>, ApiError> {
    state
        .notes
        .fetch(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))
}

/// Partially update a note.
#[utoipa::path(put, path = "/api/notes/{id}", tag = "Notes",
    params(("id" = Uuid, Path, description = "Note id")),
    request_body = crate::openapi::UpdateNoteBody,
    responses(
        (status = 200, description = "Updated note", body = Note),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
        (status = 403, description = "Wrong modification code", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 429, description = "Write quota exceeded", body = crate::error::ErrorBody)))]
pub async fn update_note(
    State(state): State<AppState>,
    NoteId(id): NoteId,
    JsonObject(body): JsonObject,
) -> Result<Json<Note>, ApiError> {
    let supplied = supplied_code(&body)?;
    let stored = state
        .notes
        .modification_code(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    if !stored.matches(supplied) {
        warn!(
            { SUBSYSTEM } = "api",
            { OPERATION } = "update",
            { NOTE_ID } = %id,
            "Modification code mismatch"
        );
        return Err(ApiError::Forbidden("Invalid modification_code".to_string()));
    }

    let changes = validate_note_changes(&body)?;
    if changes.is_empty() {
        return Err(ApiError::BadRequest(
            "No valid fields provided for update".to_string(),
        ));
    }

    state
        .notes
        .update(id, &stored, changes)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))
}

/// Delete a note. Deleting an absent note succeeds.
#[utoipa::path(delete, path = "/api/notes/{id}", tag = "Notes",
    params(("id" = Uuid, Path, description = "Note id")),
    request_body = crate::openapi::DeleteNoteBody,
    responses(
        (status = 204, description = "Deleted or already absent"),
        (status = 400, description = "Missing modification code", body = crate::error::ErrorBody),
        (status = 403, description = "Wrong modification code", body = crate::error::ErrorBody),
        (status = 429, description = "Write quota exceeded", body = crate::error::ErrorBody)))]
pub async fn delete_note(
    State(state): State<AppState>,
    NoteId(id): NoteId,
    JsonObject(body): JsonObject,
) -> Result<StatusCode, ApiError> {
    let supplied = supplied_code(&body)?;
    let Some(stored) = state.notes.modification_code(id).await? else {
        return Ok(StatusCode::NO_CONTENT);
    };

    if !stored.matches(supplied) {
        warn!(
            { SUBSYSTEM } = "api",
            { OPERATION } = "delete",
            { NOTE_ID } = %id,
            "Modification code mismatch"
        );
        return Err(ApiError::Forbidden("Invalid modification_code".to_string()));
    }

    if state.notes.delete(id, &stored).await? {
        info!(
            { SUBSYSTEM } = "api",
            { OPERATION } = "delete",
            { NOTE_ID } = %id,
            "Note deleted"
        );
    } else {
        warn!(
            { SUBSYSTEM } = "api",
            { OPERATION } = "delete",
            { NOTE_ID } = %id,
            "Note disappeared before delete"
        );
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch several notes by id, public or private.
#[utoipa::path(post, path = "/api/notes/batch", tag = "Notes",
    request_body = crate::openapi::BatchNotesBody,
    responses(
        (status = 200, description = "Existing notes among the ids", body = BatchNotesResponse),
        (status = 400, description = "Malformed ids", body = crate::error::ErrorBody)))]
pub async fn batch_notes(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> Result<Json<BatchNotesResponse>, ApiError> {
    let ids = parse_batch_ids(&body)?;
    if ids.is_empty() {
        return Ok(Json(BatchNotesResponse { notes: Vec::new() }));
    }

    let notes = state.notes.fetch_many(&ids).await?;
    info!(
        { SUBSYSTEM } = "api",
        { OPERATION } = "batch",
        requested = ids.len(),
        { RESULT_COUNT } = notes.len(),
        "Batch fetch"
    );
    Ok(Json(BatchNotesResponse { notes }))
}

// =============================================================================
// HELPERS
// =============================================================================

fn supplied_code(body: &Map<String, Value>) -> Result<&str, ApiError> {
    body.get("modification_code")
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing modification_code".to_string()))
}

/// Unique ids in request order. Every entry must be a UUID string.
fn parse_batch_ids(body: &Map<String, Value>) -> Result<Vec<Uuid>, ApiError> {
    let Some(raw) = body.get("ids").and_then(Value::as_array) else {
        return Err(ApiError::BadRequest(
            "'ids' must be a list of note ids".to_string(),
        ));
    };

    let mut ids = Vec::with_capacity(raw.len());
    let mut invalid = Vec::new();
    for value in raw {
        match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) if !ids.contains(&id) => ids.push(id),
            Some(_) => {}
            None => invalid.push(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    if !invalid.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid UUID format for IDs: {}",
            invalid.join(", ")
        )));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_supplied_code() {
        assert_eq!(
            supplied_code(&object(json!({"modification_code": "abc"}))).unwrap(),
            "abc"
        );
        for body in [
            json!({}),
            json!({"modification_code": ""}),
            json!({"modification_code": 12345678}),
        ] {
            assert!(matches!(
                supplied_code(&object(body)),
                Err(ApiError::BadRequest(ref msg)) if msg == "Missing modification_code"
            ));
        }
    }

    #[test]
    fn test_batch_ids_dedupe_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_batch_ids(&object(json!({"ids": [a, b, a]}))).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_batch_ids_lists_every_invalid_entry() {
        let err = parse_batch_ids(&object(json!({"ids": ["nope", Uuid::new_v4(), 7]})))
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::BadRequest(ref msg) if msg == "Invalid UUID format for IDs: nope, 7"
        ));
    }

    #[test]
    fn test_batch_ids_must_be_list() {
        for body in [json!({}), json!({"ids": "abc"}), json!({"ids": null})] {
            assert!(matches!(
                parse_batch_ids(&object(body)),
                Err(ApiError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn test_list_query_is_lenient() {
        let query = ListNotesQuery {
            page: Some("two".to_string()),
            limit: Some(" 500 ".to_string()),
            tag: Some(String::new()),
            search: Some("rust".to_string()),
            sort: Some("TITLE_DESC".to_string()),
        };
        let req = query.into_request();
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 100);
        assert_eq!(req.tag, None);
        assert_eq!(req.search.as_deref(), Some("rust"));
        assert_eq!(req.sort, dropnote_core::NoteSort::TitleDesc);
    }
}
