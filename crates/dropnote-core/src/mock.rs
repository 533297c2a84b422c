//! In-memory note repository for deterministic testing.
//!
//! Mirrors the PostgreSQL repository's observable behavior (ordering,
//! filters, anonymous username sequence, code-guarded writes) so handler
//! tests can run without a database.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dropnote_core::mock::MemoryNoteRepository;
//! use dropnote_core::NoteRepository;
//!
//! # async fn demo() -> dropnote_core::Result<()> {
//! let repo = MemoryNoteRepository::new();
//! assert_eq!(repo.count().await?, 0);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::defaults::ANONYMOUS_USERNAME_PREFIX;
use crate::error::{Error, Result};
use crate::models::*;
use crate::modification_code::ModificationCode;
use crate::traits::NoteRepository;

#[derive(Debug, Clone)]
struct StoredNote {
    note: Note,
    code: ModificationCode,
}

#[derive(Debug, Default)]
struct State {
    notes: HashMap<Uuid, StoredNote>,
    anonymous_seq: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Strictly increasing timestamps so ordering by `updated_at` is stable.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    fn insert(&mut self, new: NewNote) -> CreatedNote {
        let username = match new.username {
            Some(name) => name,
            None => {
                self.anonymous_seq += 1;
                format!("{}{}", ANONYMOUS_USERNAME_PREFIX, self.anonymous_seq)
            }
        };
        let now = self.tick();
        let note = Note {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            username,
            tags: new.tags,
            visibility: new.visibility,
            created_at: now,
            updated_at: now,
        };
        let code = ModificationCode::generate();
        self.notes.insert(
            note.id,
            StoredNote {
                note: note.clone(),
                code: code.clone(),
            },
        );
        CreatedNote {
            note,
            modification_code: code,
        }
    }

    fn public(&self) -> impl Iterator<Item = &Note> {
        self.notes
            .values()
            .map(|stored| &stored.note)
            .filter(|note| note.visibility == Visibility::Public)
    }
}

fn sort_notes(notes: &mut [Note], sort: NoteSort) {
    notes.sort_by(|a, b| {
        let ordering = match sort {
            NoteSort::UpdatedAtDesc | NoteSort::UpdatedAtAsc => {
                a.updated_at.cmp(&b.updated_at)
            }
            NoteSort::CreatedAtDesc | NoteSort::CreatedAtAsc => {
                a.created_at.cmp(&b.created_at)
            }
            NoteSort::TitleAsc | NoteSort::TitleDesc => a.title.cmp(&b.title),
        }
        .then_with(|| a.id.cmp(&b.id));
        match sort {
            NoteSort::UpdatedAtAsc | NoteSort::CreatedAtAsc | NoteSort::TitleAsc => ordering,
            _ => ordering.reverse(),
        }
    });
}

/// Thread-safe in-memory [`NoteRepository`].
#[derive(Debug, Default)]
pub struct MemoryNoteRepository {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a database error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Code for a stored note, for tests that need to forge requests.
    pub fn code_of(&self, id: Uuid) -> Option<ModificationCode> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.notes.get(&id).map(|stored| stored.code.clone()))
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory repository lock poisoned".to_string()))
    }
}

#[async_trait]
impl NoteRepository for MemoryNoteRepository {
    async fn count(&self) -> Result<i64> {
        Ok(self.state()?.notes.len() as i64)
    }

    async fn create(&self, note: NewNote) -> Result<CreatedNote> {
        Ok(self.state()?.insert(note))
    }

    async fn create_capped(&self, note: NewNote, max_notes: i64) -> Result<CreatedNote> {
        let mut state = self.state()?;
        if state.notes.len() as i64 >= max_notes {
            return Err(Error::CapacityReached { limit: max_notes });
        }
        Ok(state.insert(note))
    }

    async fn create_bulk(&self, notes: Vec<NewNote>) -> Result<Vec<CreatedNote>> {
        let mut state = self.state()?;
        Ok(notes.into_iter().map(|note| state.insert(note)).collect())
    }

    async fn list_public(&self, req: &ListPublicNotesRequest) -> Result<PublicNotesPage> {
        let state = self.state()?;
        let needle = req.search.as_ref().map(|s| s.to_lowercase());
        let mut matching: Vec<Note> = state
            .public()
            .filter(|note| match &req.tag {
                Some(tag) => note.tags.iter().any(|t| t == tag),
                None => true,
            })
            .filter(|note| match &needle {
                Some(needle) => {
                    note.title.to_lowercase().contains(needle)
                        || note.content.to_lowercase().contains(needle)
                }
                None => true,
            })
            .cloned()
            .collect();
        sort_notes(&mut matching, req.sort);

        let total = matching.len() as i64;
        let notes = matching
            .into_iter()
            .skip(usize::try_from(req.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(req.limit).unwrap_or(0))
            .collect();
        Ok(PublicNotesPage { notes, total })
    }

    async fn random_public(&self) -> Result<Option<Note>> {
        let state = self.state()?;
        let public: Vec<&Note> = state.public().collect();
        Ok(public.choose(&mut rand::thread_rng()).map(|note| (*note).clone()))
    }

    async fn public_tags(&self) -> Result<Vec<String>> {
        let state = self.state()?;
        let tags: BTreeSet<String> = state
            .public()
            .flat_map(|note| note.tags.iter().cloned())
            .collect();
        Ok(tags.into_iter().collect())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Note>> {
        Ok(self.state()?.notes.get(&id).map(|stored| stored.note.clone()))
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> Result<Vec<Note>> {
        let state = self.state()?;
        let wanted: BTreeSet<&Uuid> = ids.iter().collect();
        let mut notes: Vec<Note> = wanted
            .into_iter()
            .filter_map(|id| state.notes.get(id).map(|stored| stored.note.clone()))
            .collect();
        sort_notes(&mut notes, NoteSort::UpdatedAtDesc);
        Ok(notes)
    }

    async fn modification_code(&self, id: Uuid) -> Result<Option<ModificationCode>> {
        Ok(self.state()?.notes.get(&id).map(|stored| stored.code.clone()))
    }

    async fn update(
        &self,
        id: Uuid,
        code: &ModificationCode,
        changes: NoteChanges,
    ) -> Result<Option<Note>> {
        let mut state = self.state()?;
        let now = state.tick();
        let Some(stored) = state.notes.get_mut(&id) else {
            return Ok(None);
        };
        if !stored.code.matches(code.as_str()) {
            return Ok(None);
        }
        let note = &mut stored.note;
        if let Some(title) = changes.title {
            note.title = title;
        }
        if let Some(content) = changes.content {
            note.content = content;
        }
        if let Some(tags) = changes.tags {
            note.tags = tags;
        }
        if let Some(visibility) = changes.visibility {
            note.visibility = visibility;
        }
        note.updated_at = now;
        Ok(Some(note.clone()))
    }

    async fn delete(&self, id: Uuid, code: &ModificationCode) -> Result<bool> {
        let mut state = self.state()?;
        let matches = state
            .notes
            .get(&id)
            .is_some_and(|stored| stored.code.matches(code.as_str()));
        if matches {
            state.notes.remove(&id);
        }
        Ok(matches)
    }

    async fn ping(&self) -> Result<()> {
        self.state().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_note(title: &str, tags: &[&str], visibility: Visibility) -> NewNote {
        NewNote {
            title: title.to_string(),
            content: format!("{} body", title),
            username: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            visibility,
        }
    }

    #[tokio::test]
    async fn test_anonymous_usernames_are_sequential() {
        let repo = MemoryNoteRepository::new();
        let a = repo.create(new_note("a", &[], Visibility::Public)).await.unwrap();
        let b = repo.create(new_note("b", &[], Visibility::Public)).await.unwrap();
        assert_eq!(a.note.username, "anonymous1");
        assert_eq!(b.note.username, "anonymous2");
        assert_eq!(a.note.created_at, a.note.updated_at);
    }

    #[tokio::test]
    async fn test_list_public_excludes_private_and_filters() {
        let repo = MemoryNoteRepository::new();
        repo.create(new_note("Rust tips", &["rust"], Visibility::Public))
            .await
            .unwrap();
        repo.create(new_note("Secret", &["rust"], Visibility::Private))
            .await
            .unwrap();
        repo.create(new_note("Go tips", &["go"], Visibility::Public))
            .await
            .unwrap();

        let page = repo
            .list_public(&ListPublicNotesRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.notes[0].title, "Go tips");

        let req = ListPublicNotesRequest {
            tag: Some("rust".to_string()),
            ..Default::default()
        };
        let page = repo.list_public(&req).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.notes[0].title, "Rust tips");

        let req = ListPublicNotesRequest {
            search: Some("TIPS".to_string()),
            sort: NoteSort::TitleAsc,
            ..Default::default()
        };
        let titles: Vec<String> = repo
            .list_public(&req)
            .await
            .unwrap()
            .notes
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["Go tips", "Rust tips"]);
    }

    #[tokio::test]
    async fn test_public_tags_sorted_and_distinct() {
        let repo = MemoryNoteRepository::new();
        repo.create(new_note("a", &["zeta", "alpha"], Visibility::Public))
            .await
            .unwrap();
        repo.create(new_note("b", &["alpha"], Visibility::Public))
            .await
            .unwrap();
        repo.create(new_note("c", &["hidden"], Visibility::Private))
            .await
            .unwrap();
        assert_eq!(repo.public_tags().await.unwrap(), vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_update_requires_matching_code() {
        let repo = MemoryNoteRepository::new();
        let created = repo
            .create(new_note("a", &[], Visibility::Public))
            .await
            .unwrap();
        let wrong = ModificationCode::from_stored("00000000".to_string());
        let changes = NoteChanges {
            title: Some("b".to_string()),
            ..Default::default()
        };
        assert!(repo
            .update(created.note.id, &wrong, changes.clone())
            .await
            .unwrap()
            .is_none());

        let updated = repo
            .update(created.note.id, &created.modification_code, changes)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "b");
        assert!(updated.updated_at > created.note.updated_at);
        assert_eq!(updated.created_at, created.note.created_at);
    }

    #[tokio::test]
    async fn test_delete_requires_matching_code() {
        let repo = MemoryNoteRepository::new();
        let created = repo
            .create(new_note("a", &[], Visibility::Public))
            .await
            .unwrap();
        let wrong = ModificationCode::from_stored("00000000".to_string());
        assert!(!repo.delete(created.note.id, &wrong).await.unwrap());
        assert!(repo
            .delete(created.note.id, &created.modification_code)
            .await
            .unwrap());
        assert!(repo.fetch(created.note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_many_ignores_visibility_and_unknown_ids() {
        let repo = MemoryNoteRepository::new();
        let a = repo
            .create(new_note("a", &[], Visibility::Private))
            .await
            .unwrap();
        let b = repo
            .create(new_note("b", &[], Visibility::Public))
            .await
            .unwrap();
        let notes = repo
            .fetch_many(&[a.note.id, Uuid::new_v4(), b.note.id, a.note.id])
            .await
            .unwrap();
        let ids: Vec<Uuid> = notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.note.id, a.note.id]);
    }

    #[tokio::test]
    async fn test_create_capped_stops_at_limit() {
        let repo = MemoryNoteRepository::new();
        repo.create_capped(new_note("a", &[], Visibility::Public), 2)
            .await
            .unwrap();
        repo.create_capped(new_note("b", &[], Visibility::Private), 2)
            .await
            .unwrap();
        let err = repo
            .create_capped(new_note("c", &[], Visibility::Public), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CapacityReached { limit: 2 }));
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_surfaces_database_error() {
        let repo = MemoryNoteRepository::new();
        repo.set_unavailable(true);
        assert!(matches!(repo.ping().await, Err(Error::Database(_))));
        repo.set_unavailable(false);
        assert!(repo.ping().await.is_ok());
    }
}
