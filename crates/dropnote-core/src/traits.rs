//! Storage abstraction for notes.
//!
//! The HTTP layer and the seeding tool only ever talk to a
//! [`NoteRepository`]; the PostgreSQL implementation lives in
//! `dropnote-db`, and an in-memory one is available behind the `mock`
//! feature for tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::modification_code::ModificationCode;

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Repository for note storage.
///
/// "Absent" is never an error here: lookups return `Option`, and writes
/// guarded by a modification code report a miss as `None`/`false` so the
/// caller decides which status to surface.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Total number of stored notes, public and private.
    async fn count(&self) -> Result<i64>;

    /// Insert a note with a freshly generated modification code.
    ///
    /// A missing username becomes `anonymous<N>` from a monotonic sequence.
    async fn create(&self, note: NewNote) -> Result<CreatedNote>;

    /// Insert a note only while fewer than `max_notes` exist.
    ///
    /// The count and the insert are atomic with respect to other capped
    /// inserts. Fails with [`Error::CapacityReached`](crate::Error::CapacityReached)
    /// when the table is full.
    async fn create_capped(&self, note: NewNote, max_notes: i64) -> Result<CreatedNote>;

    /// Insert several notes in a single transaction. All or nothing.
    async fn create_bulk(&self, notes: Vec<NewNote>) -> Result<Vec<CreatedNote>>;

    /// One page of public notes matching the request's filters.
    async fn list_public(&self, req: &ListPublicNotesRequest) -> Result<PublicNotesPage>;

    /// A uniformly random public note, if any exist.
    async fn random_public(&self) -> Result<Option<Note>>;

    /// Distinct tags used by public notes, sorted ascending.
    async fn public_tags(&self) -> Result<Vec<String>>;

    /// Fetch a note by id regardless of visibility.
    async fn fetch(&self, id: Uuid) -> Result<Option<Note>>;

    /// Fetch every existing note among `ids` regardless of visibility,
    /// newest update first.
    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Note>>;

    /// Stored modification code for a note.
    async fn modification_code(&self, id: Uuid) -> Result<Option<ModificationCode>>;

    /// Apply `changes` and bump `updated_at`, only if `code` still matches.
    ///
    /// Returns `None` when no row matched (deleted concurrently or code
    /// mismatch).
    async fn update(
        &self,
        id: Uuid,
        code: &ModificationCode,
        changes: NoteChanges,
    ) -> Result<Option<Note>>;

    /// Delete the note if `code` matches. Returns whether a row was removed.
    async fn delete(&self, id: Uuid, code: &ModificationCode) -> Result<bool>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<()>;
}
