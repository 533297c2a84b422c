//! OpenAPI document served at `/api-docs/openapi.json`.

use utoipa::OpenApi;
use uuid::Uuid;

use dropnote_core::{CreatedNote, ModificationCode, Note, NoteSort, Pagination, Visibility};

use crate::error::ErrorBody;
use crate::handlers::notes::{BatchNotesResponse, NoteListResponse};
use crate::handlers::system::{HealthResponse, RootResponse};
use crate::handlers::tags::TagsResponse;

// =============================================================================
// REQUEST BODY SCHEMAS
// =============================================================================
//
// Document-only. Handlers read bodies as raw JSON objects through
// `JsonObject` so absent fields and wrongly typed fields can be told apart;
// these types are never constructed.

/// Create body. `title` and `content` are required.
#[derive(Debug, utoipa::ToSchema)]
pub struct CreateNoteBody {
    pub title: String,
    pub content: String,
    pub username: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<Visibility>,
}

/// Update body. Only the fields present are changed.
#[derive(Debug, utoipa::ToSchema)]
pub struct UpdateNoteBody {
    pub modification_code: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, utoipa::ToSchema)]
pub struct DeleteNoteBody {
    pub modification_code: String,
}

#[derive(Debug, utoipa::ToSchema)]
pub struct BatchNotesBody {
    pub ids: Vec<Uuid>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DropNote API",
        description = "Anonymous note sharing guarded by per-note modification codes"
    ),
    paths(
        crate::handlers::system::root,
        crate::handlers::system::health_check,
        crate::handlers::notes::create_note,
        crate::handlers::notes::list_notes,
        crate::handlers::notes::random_note,
        crate::handlers::notes::get_note,
        crate::handlers::notes::update_note,
        crate::handlers::notes::delete_note,
        crate::handlers::notes::batch_notes,
        crate::handlers::tags::list_tags,
    ),
    components(schemas(
        Note,
        CreatedNote,
        ModificationCode,
        Visibility,
        NoteSort,
        Pagination,
        ErrorBody,
        CreateNoteBody,
        UpdateNoteBody,
        DeleteNoteBody,
        BatchNotesBody,
        NoteListResponse,
        BatchNotesResponse,
        TagsResponse,
        RootResponse,
        HealthResponse,
    )),
    tags(
        (name = "Notes", description = "Note CRUD, listing and batch fetch"),
        (name = "Tags", description = "Tag index over public notes"),
        (name = "System", description = "Banner and health checks")
    )
)]
pub struct ApiDoc;
