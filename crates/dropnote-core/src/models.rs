//! Core data models for DropNote.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::Error;
use crate::modification_code::ModificationCode;

// =============================================================================
// NOTE TYPES
// =============================================================================

/// Listing visibility of a note.
///
/// `Private` means unlisted: the note is left out of listings, random picks
/// and the tag index, but anyone holding its id can still read it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    /// Value stored in the `visibility` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = Error;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(Error::InvalidInput(format!(
                "Unknown visibility '{}'",
                other
            ))),
        }
    }
}

/// A note as returned by every read endpoint. Never carries the
/// modification code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub username: String,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response to a successful create: the note plus its modification code.
///
/// This is the only place the code is ever handed out.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CreatedNote {
    #[serde(flatten)]
    pub note: Note,
    pub modification_code: ModificationCode,
}

/// Validated input for a new note.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    /// `None` asks the store for an `anonymous<N>` username.
    pub username: Option<String>,
    pub tags: Vec<String>,
    pub visibility: Visibility,
}

/// Validated partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<Visibility>,
}

impl NoteChanges {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.visibility.is_none()
    }
}

// =============================================================================
// LISTING
// =============================================================================

/// Sort orders accepted by the public listing.
///
/// Each variant maps to a fixed ORDER BY clause; client input only ever
/// selects a variant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NoteSort {
    #[default]
    UpdatedAtDesc,
    UpdatedAtAsc,
    CreatedAtDesc,
    CreatedAtAsc,
    TitleAsc,
    TitleDesc,
}

impl NoteSort {
    pub const ALL: [NoteSort; 6] = [
        NoteSort::UpdatedAtDesc,
        NoteSort::UpdatedAtAsc,
        NoteSort::CreatedAtDesc,
        NoteSort::CreatedAtAsc,
        NoteSort::TitleAsc,
        NoteSort::TitleDesc,
    ];

    /// Public name, e.g. `updated_at_desc`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteSort::UpdatedAtDesc => "updated_at_desc",
            NoteSort::UpdatedAtAsc => "updated_at_asc",
            NoteSort::CreatedAtDesc => "created_at_desc",
            NoteSort::CreatedAtAsc => "created_at_asc",
            NoteSort::TitleAsc => "title_asc",
            NoteSort::TitleDesc => "title_desc",
        }
    }

    /// Look up a sort by name (case-insensitive). Unknown names fall back to
    /// the default rather than failing.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return NoteSort::default();
        };
        let wanted = raw.trim().to_lowercase();
        NoteSort::ALL
            .into_iter()
            .find(|sort| sort.as_str() == wanted)
            .unwrap_or_default()
    }

    /// ORDER BY clause with `id` as tie-break in the same direction, so
    /// pages stay stable when primary values collide.
    pub fn order_by_clause(&self) -> &'static str {
        match self {
            NoteSort::UpdatedAtDesc => "updated_at DESC, id DESC",
            NoteSort::UpdatedAtAsc => "updated_at ASC, id ASC",
            NoteSort::CreatedAtDesc => "created_at DESC, id DESC",
            NoteSort::CreatedAtAsc => "created_at ASC, id ASC",
            NoteSort::TitleAsc => "title ASC, id ASC",
            NoteSort::TitleDesc => "title DESC, id DESC",
        }
    }
}

impl fmt::Display for NoteSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized request for the public note listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPublicNotesRequest {
    /// 1-based page number.
    pub page: i64,
    /// Page size, within `1..=PAGE_LIMIT_MAX`.
    pub limit: i64,
    /// Exact tag membership filter.
    pub tag: Option<String>,
    /// Case-insensitive substring over title or content.
    pub search: Option<String>,
    pub sort: NoteSort,
}

impl Default for ListPublicNotesRequest {
    fn default() -> Self {
        Self {
            page: defaults::PAGE,
            limit: defaults::PAGE_LIMIT,
            tag: None,
            search: None,
            sort: NoteSort::default(),
        }
    }
}

impl ListPublicNotesRequest {
    /// Build a request from loosely-typed query input, clamping page and
    /// limit into range and dropping empty filters.
    pub fn normalized(
        page: Option<i64>,
        limit: Option<i64>,
        tag: Option<String>,
        search: Option<String>,
        sort: Option<&str>,
    ) -> Self {
        let page = page.unwrap_or(defaults::PAGE).max(1);
        let limit = limit
            .unwrap_or(defaults::PAGE_LIMIT)
            .clamp(1, defaults::PAGE_LIMIT_MAX);
        Self {
            page,
            limit,
            tag: tag.filter(|t| !t.is_empty()),
            search: search.filter(|s| !s.is_empty()),
            sort: NoteSort::parse_or_default(sort),
        }
    }

    /// Row offset of the first note on this page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of public notes plus the total under the same filter.
#[derive(Debug, Clone, Default)]
pub struct PublicNotesPage {
    pub notes: Vec<Note>,
    pub total: i64,
}

/// Pagination metadata returned alongside a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Pagination {
    pub current_page: i64,
    pub per_page: i64,
    pub total_notes: i64,
    pub total_pages: i64,
    pub filter_tag: Option<String>,
    pub search_term: Option<String>,
    pub sort: NoteSort,
}

impl Pagination {
    pub fn new(req: &ListPublicNotesRequest, total_notes: i64) -> Self {
        Self {
            current_page: req.page,
            per_page: req.limit,
            total_notes,
            total_pages: (total_notes + req.limit - 1) / req.limit,
            filter_tag: req.tag.clone(),
            search_term: req.search.clone(),
            sort: req.sort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_parse_is_case_insensitive() {
        assert_eq!("PUBLIC".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!(" Private ".parse::<Visibility>().unwrap(), Visibility::Private);
        assert!("secret".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_visibility_serializes_lowercase() {
        let json = serde_json::to_string(&Visibility::Private).unwrap();
        assert_eq!(json, "\"private\"");
    }

    #[test]
    fn test_sort_parse_known_values() {
        for sort in NoteSort::ALL {
            assert_eq!(NoteSort::parse_or_default(Some(sort.as_str())), sort);
        }
        assert_eq!(
            NoteSort::parse_or_default(Some("TITLE_ASC")),
            NoteSort::TitleAsc
        );
    }

    #[test]
    fn test_sort_unknown_falls_back_to_default() {
        assert_eq!(NoteSort::parse_or_default(None), NoteSort::UpdatedAtDesc);
        assert_eq!(
            NoteSort::parse_or_default(Some("id; DROP TABLE drop_note")),
            NoteSort::UpdatedAtDesc
        );
        assert_eq!(
            NoteSort::parse_or_default(Some("username_asc")),
            NoteSort::UpdatedAtDesc
        );
    }

    #[test]
    fn test_sort_serde_name_matches_as_str() {
        for sort in NoteSort::ALL {
            let json = serde_json::to_value(sort).unwrap();
            assert_eq!(json, serde_json::Value::String(sort.as_str().to_string()));
        }
    }

    #[test]
    fn test_order_by_always_breaks_ties_on_id_in_same_direction() {
        for sort in NoteSort::ALL {
            let clause = sort.order_by_clause();
            let direction = if sort.as_str().ends_with("_asc") {
                "ASC"
            } else {
                "DESC"
            };
            assert!(
                clause.ends_with(&format!("id {}", direction)),
                "{} should end with id {}",
                clause,
                direction
            );
        }
    }

    #[test]
    fn test_list_request_clamps_page_and_limit() {
        let req = ListPublicNotesRequest::normalized(Some(0), Some(1000), None, None, None);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 100);

        let req = ListPublicNotesRequest::normalized(Some(-3), Some(0), None, None, None);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 1);

        let req = ListPublicNotesRequest::normalized(None, None, None, None, None);
        assert_eq!(req, ListPublicNotesRequest::default());
    }

    #[test]
    fn test_list_request_drops_empty_filters() {
        let req = ListPublicNotesRequest::normalized(
            None,
            None,
            Some(String::new()),
            Some(String::new()),
            Some("bogus"),
        );
        assert_eq!(req.tag, None);
        assert_eq!(req.search, None);
        assert_eq!(req.sort, NoteSort::UpdatedAtDesc);
    }

    #[test]
    fn test_list_request_offset() {
        let req = ListPublicNotesRequest::normalized(Some(3), Some(20), None, None, None);
        assert_eq!(req.offset(), 40);
    }

    #[test]
    fn test_pagination_total_pages_is_ceiling() {
        let req = ListPublicNotesRequest::normalized(Some(1), Some(10), None, None, None);
        assert_eq!(Pagination::new(&req, 0).total_pages, 0);
        assert_eq!(Pagination::new(&req, 10).total_pages, 1);
        assert_eq!(Pagination::new(&req, 11).total_pages, 2);
    }

    #[test]
    fn test_pagination_echoes_filters() {
        let req = ListPublicNotesRequest::normalized(
            Some(2),
            Some(5),
            Some("rust".to_string()),
            Some("axum".to_string()),
            Some("title_desc"),
        );
        let meta = Pagination::new(&req, 7);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["current_page"], 2);
        assert_eq!(json["per_page"], 5);
        assert_eq!(json["total_notes"], 7);
        assert_eq!(json["total_pages"], 2);
        assert_eq!(json["filter_tag"], "rust");
        assert_eq!(json["search_term"], "axum");
        assert_eq!(json["sort"], "title_desc");
    }

    #[test]
    fn test_note_changes_is_empty() {
        assert!(NoteChanges::default().is_empty());
        let changes = NoteChanges {
            visibility: Some(Visibility::Private),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
