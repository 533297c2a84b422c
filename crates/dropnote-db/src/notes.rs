//! Note repository implementation.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Acquire, Pool, Postgres, Row, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dropnote_core::defaults::{ANONYMOUS_USERNAME_PREFIX, MODIFICATION_CODE_ATTEMPTS};
use dropnote_core::logging::{
    COMPONENT, DURATION_MS, NOTE_ID, OPERATION, RESULT_COUNT, SUBSYSTEM,
};
use dropnote_core::{
    CreatedNote, Error, ListPublicNotesRequest, ModificationCode, NewNote, Note, NoteChanges,
    NoteRepository, NoteSort, PublicNotesPage, Result, Visibility,
};

use crate::escape_like;
use crate::pool::log_pool_metrics;

/// Columns returned for every note read. Never includes `modification_code`.
const NOTE_COLUMNS: &str =
    "id, title, content, username, COALESCE(tags, '{}') AS tags, visibility, created_at, updated_at";

const MODIFICATION_CODE_CONSTRAINT: &str = "uq_drop_note_modification_code";

/// PostgreSQL implementation of NoteRepository.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

// =============================================================================
// HELPER FUNCTIONS FOR QUERY BUILDING
// =============================================================================

/// Public-listing WHERE clause. Parameters start at `$1`: the tag first when
/// present, then the search pattern. Returns the next free parameter index.
fn build_public_filter(req: &ListPublicNotesRequest) -> (String, usize) {
    let mut clause = String::from("visibility = 'public'");
    let mut param_idx = 1;

    if req.tag.is_some() {
        clause.push_str(&format!(" AND ${} = ANY(tags)", param_idx));
        param_idx += 1;
    }
    if req.search.is_some() {
        clause.push_str(&format!(
            " AND (title ILIKE ${0} ESCAPE '\\' OR content ILIKE ${0} ESCAPE '\\')",
            param_idx
        ));
        param_idx += 1;
    }
    (clause, param_idx)
}

fn search_pattern(search: &str) -> String {
    format!("%{}%", escape_like(search))
}

/// Bind the public-listing filters in the order `build_public_filter` numbers them.
macro_rules! bind_public_filters {
    ($query:expr, $req:expr, $pattern:expr) => {{
        let mut q = $query;
        if let Some(tag) = &$req.tag {
            q = q.bind(tag);
        }
        if let Some(pattern) = &$pattern {
            q = q.bind(pattern);
        }
        q
    }};
}

/// SET list for a partial update. `$1` is the id and `$2` the code; change
/// parameters follow in field order.
fn build_update_assignments(changes: &NoteChanges) -> String {
    let mut assignments = Vec::new();
    let mut param_idx = 3;

    for (column, present) in [
        ("title", changes.title.is_some()),
        ("content", changes.content.is_some()),
        ("tags", changes.tags.is_some()),
        ("visibility", changes.visibility.is_some()),
    ] {
        if present {
            assignments.push(format!("{} = ${}", column, param_idx));
            param_idx += 1;
        }
    }
    assignments.push("updated_at = now()".to_string());
    assignments.join(", ")
}

fn map_row_to_note(row: &PgRow) -> Result<Note> {
    let visibility: String = row.try_get("visibility")?;
    let visibility: Visibility = visibility
        .parse()
        .map_err(|_| Error::Internal(format!("Unexpected stored visibility '{}'", visibility)))?;

    Ok(Note {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        username: row.try_get("username")?,
        tags: row.try_get("tags")?,
        visibility,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn is_code_collision(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation()
                && db_err.constraint() == Some(MODIFICATION_CODE_CONSTRAINT)
        }
        _ => false,
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn count(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM drop_note")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(total)
    }

    async fn create(&self, note: NewNote) -> Result<CreatedNote> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let created = self.insert_tx(&mut tx, note).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(created)
    }

    async fn create_capped(&self, note: NewNote, max_notes: i64) -> Result<CreatedNote> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Self-conflicting lock: capped inserts queue up, plain reads do not.
        sqlx::query("LOCK TABLE drop_note IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM drop_note")
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if count >= max_notes {
            warn!(
                { SUBSYSTEM } = "database",
                { COMPONENT } = "notes",
                { OPERATION } = "create",
                count,
                max_notes,
                "Note limit reached"
            );
            return Err(Error::CapacityReached { limit: max_notes });
        }

        let created = self.insert_tx(&mut tx, note).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(created)
    }

    async fn create_bulk(&self, notes: Vec<NewNote>) -> Result<Vec<CreatedNote>> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let created = self.insert_bulk_tx(&mut tx, notes).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            { SUBSYSTEM } = "database",
            { COMPONENT } = "notes",
            { OPERATION } = "create_bulk",
            { RESULT_COUNT } = created.len(),
            { DURATION_MS } = start.elapsed().as_millis() as u64,
            "Inserted notes in one transaction"
        );
        Ok(created)
    }

    async fn list_public(&self, req: &ListPublicNotesRequest) -> Result<PublicNotesPage> {
        let start = Instant::now();
        let (where_clause, param_idx) = build_public_filter(req);
        let pattern = req.search.as_deref().map(search_pattern);

        let count_sql = format!("SELECT COUNT(*) FROM drop_note WHERE {}", where_clause);
        let total: i64 = {
            let q = sqlx::query_scalar(&count_sql);
            let q = bind_public_filters!(q, req, pattern);
            q.fetch_one(&self.pool).await.map_err(Error::Database)?
        };

        let notes_sql = format!(
            "SELECT {} FROM drop_note WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            NOTE_COLUMNS,
            where_clause,
            req.sort.order_by_clause(),
            param_idx,
            param_idx + 1
        );
        let rows = {
            let q = sqlx::query(&notes_sql);
            let q = bind_public_filters!(q, req, pattern);
            q.bind(req.limit)
                .bind(req.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?
        };
        let notes = rows.iter().map(map_row_to_note).collect::<Result<Vec<_>>>()?;

        debug!(
            { SUBSYSTEM } = "database",
            { COMPONENT } = "notes",
            { OPERATION } = "list_public",
            sort = %req.sort,
            has_tag = req.tag.is_some(),
            has_search = req.search.is_some(),
            { RESULT_COUNT } = notes.len(),
            total,
            { DURATION_MS } = start.elapsed().as_millis() as u64,
            "Listed public notes"
        );
        Ok(PublicNotesPage { notes, total })
    }

    async fn random_public(&self) -> Result<Option<Note>> {
        let sql = format!(
            "SELECT {} FROM drop_note WHERE visibility = 'public' ORDER BY random() LIMIT 1",
            NOTE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_note).transpose()
    }

    async fn public_tags(&self) -> Result<Vec<String>> {
        let tags: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT tag FROM drop_note, unnest(tags) AS tag \
             WHERE visibility = 'public' ORDER BY tag",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(tags)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Note>> {
        let sql = format!("SELECT {} FROM drop_note WHERE id = $1", NOTE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_note).transpose()
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Note>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM drop_note WHERE id = ANY($1) ORDER BY {}",
            NOTE_COLUMNS,
            NoteSort::UpdatedAtDesc.order_by_clause()
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_row_to_note).collect()
    }

    async fn modification_code(&self, id: Uuid) -> Result<Option<ModificationCode>> {
        let code: Option<String> =
            sqlx::query_scalar("SELECT modification_code FROM drop_note WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(code.map(ModificationCode::from_stored))
    }

    async fn update(
        &self,
        id: Uuid,
        code: &ModificationCode,
        changes: NoteChanges,
    ) -> Result<Option<Note>> {
        let sql = format!(
            "UPDATE drop_note SET {} WHERE id = $1 AND modification_code = $2 RETURNING {}",
            build_update_assignments(&changes),
            NOTE_COLUMNS
        );

        let mut q = sqlx::query(&sql).bind(id).bind(code.as_str());
        if let Some(title) = &changes.title {
            q = q.bind(title);
        }
        if let Some(content) = &changes.content {
            q = q.bind(content);
        }
        if let Some(tags) = &changes.tags {
            q = q.bind(tags);
        }
        if let Some(visibility) = changes.visibility {
            q = q.bind(visibility.as_str());
        }

        let row = q
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        let note = row.as_ref().map(map_row_to_note).transpose()?;

        if note.is_some() {
            info!(
                { SUBSYSTEM } = "database",
                { COMPONENT } = "notes",
                { OPERATION } = "update",
                { NOTE_ID } = %id,
                "Note updated"
            );
        }
        Ok(note)
    }

    async fn delete(&self, id: Uuid, code: &ModificationCode) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drop_note WHERE id = $1 AND modification_code = $2")
            .bind(id)
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        log_pool_metrics(&self.pool);
        Ok(())
    }
}

// =============================================================================
// TRANSACTION-AWARE VARIANTS
// =============================================================================

impl PgNoteRepository {
    /// Insert a note within an existing transaction.
    ///
    /// Each attempt runs in its own savepoint so a modification-code
    /// collision can be retried without aborting the outer transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        note: NewNote,
    ) -> Result<CreatedNote> {
        let username = match note.username {
            Some(ref username) => username.clone(),
            None => {
                let seq: i64 = sqlx::query_scalar("SELECT nextval('anonymous_user_seq')")
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(Error::Database)?;
                format!("{}{}", ANONYMOUS_USERNAME_PREFIX, seq)
            }
        };

        let sql = format!(
            "INSERT INTO drop_note (title, content, username, tags, visibility, modification_code) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            NOTE_COLUMNS
        );

        for attempt in 1..=MODIFICATION_CODE_ATTEMPTS {
            let code = ModificationCode::generate();
            let mut savepoint = (&mut *tx).begin().await.map_err(Error::Database)?;

            let result = sqlx::query(&sql)
                .bind(&note.title)
                .bind(&note.content)
                .bind(&username)
                .bind(&note.tags)
                .bind(note.visibility.as_str())
                .bind(code.as_str())
                .fetch_one(&mut *savepoint)
                .await;

            match result {
                Ok(row) => {
                    savepoint.commit().await.map_err(Error::Database)?;
                    let note = map_row_to_note(&row)?;
                    info!(
                        { SUBSYSTEM } = "database",
                        { COMPONENT } = "notes",
                        { OPERATION } = "create",
                        { NOTE_ID } = %note.id,
                        visibility = %note.visibility,
                        "Note created"
                    );
                    return Ok(CreatedNote {
                        note,
                        modification_code: code,
                    });
                }
                Err(err) if is_code_collision(&err) => {
                    savepoint.rollback().await.map_err(Error::Database)?;
                    warn!(
                        { SUBSYSTEM } = "database",
                        { COMPONENT } = "notes",
                        { OPERATION } = "create",
                        attempt,
                        "Modification code collision, retrying"
                    );
                }
                Err(err) => return Err(Error::Database(err)),
            }
        }

        Err(Error::Internal(format!(
            "Could not generate a unique modification code after {} attempts",
            MODIFICATION_CODE_ATTEMPTS
        )))
    }

    /// Insert several notes within an existing transaction.
    pub async fn insert_bulk_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        notes: Vec<NewNote>,
    ) -> Result<Vec<CreatedNote>> {
        let mut created = Vec::with_capacity(notes.len());
        for note in notes {
            created.push(self.insert_tx(tx, note).await?);
        }
        Ok(created)
    }
}
