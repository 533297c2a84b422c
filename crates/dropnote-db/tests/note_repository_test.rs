//! PostgreSQL-backed NoteRepository tests.
//!
//! Run with: `cargo test -p dropnote-db -- --ignored`

use dropnote_db::test_fixtures::{note_with, sample_note, TestDatabase};
use dropnote_db::{
    ListPublicNotesRequest, ModificationCode, NewNote, NoteChanges, NoteRepository, NoteSort,
    Visibility,
};
use uuid::Uuid;

async fn setup() -> TestDatabase {
    let _ = dotenvy::dotenv();
    TestDatabase::new()
        .await
        .expect("Failed to set up test database")
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_create_assigns_defaults_and_code() {
    let db = setup().await;

    let created = db.notes.create(sample_note("First")).await.unwrap();
    assert!(created.note.username.starts_with("anonymous"));
    assert_eq!(created.note.visibility, Visibility::Public);
    assert_eq!(created.modification_code.as_str().len(), 8);
    assert_eq!(created.note.created_at, created.note.updated_at);

    let second = db.notes.create(sample_note("Second")).await.unwrap();
    let first_n: i64 = created.note.username["anonymous".len()..].parse().unwrap();
    let second_n: i64 = second.note.username["anonymous".len()..].parse().unwrap();
    assert!(second_n > first_n);

    let stored = db.notes.modification_code(created.note.id).await.unwrap();
    assert_eq!(stored, Some(created.modification_code.clone()));

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_create_keeps_explicit_username() {
    let db = setup().await;

    let created = db
        .notes
        .create(NewNote {
            username: Some("alice".to_string()),
            ..sample_note("Mine")
        })
        .await
        .unwrap();
    assert_eq!(created.note.username, "alice");

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_list_public_filters_and_counts() {
    let db = setup().await;

    db.notes
        .create(note_with("Rust ownership", &["rust"], Visibility::Public))
        .await
        .unwrap();
    db.notes
        .create(note_with("Hidden rust", &["rust"], Visibility::Private))
        .await
        .unwrap();
    db.notes
        .create(note_with("100% coverage", &["testing"], Visibility::Public))
        .await
        .unwrap();

    let page = db
        .notes
        .list_public(&ListPublicNotesRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.notes.iter().all(|n| n.visibility == Visibility::Public));

    let by_tag = ListPublicNotesRequest {
        tag: Some("rust".to_string()),
        ..Default::default()
    };
    let page = db.notes.list_public(&by_tag).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.notes[0].title, "Rust ownership");

    // '%' in the search term is a literal, not a wildcard
    let literal = ListPublicNotesRequest {
        search: Some("0% cov".to_string()),
        ..Default::default()
    };
    let page = db.notes.list_public(&literal).await.unwrap();
    assert_eq!(page.total, 1);

    let case_insensitive = ListPublicNotesRequest {
        search: Some("OWNERSHIP".to_string()),
        ..Default::default()
    };
    assert_eq!(db.notes.list_public(&case_insensitive).await.unwrap().total, 1);

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_list_public_pagination_and_sort() {
    let db = setup().await;

    for title in ["b", "a", "c"] {
        db.notes.create(sample_note(title)).await.unwrap();
    }

    let req = ListPublicNotesRequest {
        limit: 2,
        sort: NoteSort::TitleAsc,
        ..Default::default()
    };
    let page = db.notes.list_public(&req).await.unwrap();
    assert_eq!(page.total, 3);
    let titles: Vec<_> = page.notes.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b"]);

    let req = ListPublicNotesRequest { page: 2, ..req };
    let page = db.notes.list_public(&req).await.unwrap();
    assert_eq!(page.notes.len(), 1);
    assert_eq!(page.notes[0].title, "c");

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_public_tags_and_random() {
    let db = setup().await;

    assert!(db.notes.random_public().await.unwrap().is_none());

    db.notes
        .create(note_with("one", &["zeta", "alpha"], Visibility::Public))
        .await
        .unwrap();
    db.notes
        .create(note_with("two", &["alpha"], Visibility::Public))
        .await
        .unwrap();
    db.notes
        .create(note_with("three", &["secret"], Visibility::Private))
        .await
        .unwrap();

    assert_eq!(db.notes.public_tags().await.unwrap(), vec!["alpha", "zeta"]);

    let random = db.notes.random_public().await.unwrap().unwrap();
    assert_eq!(random.visibility, Visibility::Public);

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_update_guarded_by_code() {
    let db = setup().await;

    let created = db.notes.create(sample_note("Original")).await.unwrap();
    let id = created.note.id;
    let changes = NoteChanges {
        title: Some("Changed".to_string()),
        tags: Some(vec![]),
        ..Default::default()
    };

    let wrong = ModificationCode::from_stored("ffffffff".to_string());
    assert!(db
        .notes
        .update(id, &wrong, changes.clone())
        .await
        .unwrap()
        .is_none());
    assert_eq!(db.notes.fetch(id).await.unwrap().unwrap().title, "Original");

    let updated = db
        .notes
        .update(id, &created.modification_code, changes)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Changed");
    assert!(updated.tags.is_empty());
    assert_eq!(updated.content, created.note.content);
    assert_eq!(updated.created_at, created.note.created_at);
    assert!(updated.updated_at > created.note.updated_at);

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_delete_guarded_by_code() {
    let db = setup().await;

    let created = db.notes.create(sample_note("Doomed")).await.unwrap();
    let id = created.note.id;

    let wrong = ModificationCode::from_stored("ffffffff".to_string());
    assert!(!db.notes.delete(id, &wrong).await.unwrap());
    assert!(db.notes.delete(id, &created.modification_code).await.unwrap());
    assert!(db.notes.fetch(id).await.unwrap().is_none());
    assert!(!db.notes.delete(id, &created.modification_code).await.unwrap());
    assert_eq!(db.notes.count().await.unwrap(), 0);

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_fetch_many_ignores_visibility() {
    let db = setup().await;

    let public = db.notes.create(sample_note("public")).await.unwrap();
    let private = db
        .notes
        .create(note_with("private", &[], Visibility::Private))
        .await
        .unwrap();

    let notes = db
        .notes
        .fetch_many(&[public.note.id, Uuid::new_v4(), private.note.id])
        .await
        .unwrap();
    let ids: Vec<Uuid> = notes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![private.note.id, public.note.id]);

    assert!(db.notes.fetch_many(&[]).await.unwrap().is_empty());

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_table_rejects_more_than_ten_tags() {
    let db = setup().await;

    let tags: Vec<String> = (0..11).map(|i| format!("t{}", i)).collect();
    let result = db
        .notes
        .create(NewNote {
            tags,
            ..sample_note("too many")
        })
        .await;
    assert!(result.is_err());
    assert_eq!(db.notes.count().await.unwrap(), 0);

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_create_bulk_is_atomic() {
    let db = setup().await;

    let created = db
        .notes
        .create_bulk(vec![sample_note("one"), sample_note("two")])
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_ne!(created[0].modification_code, created[1].modification_code);

    let too_many: Vec<String> = (0..11).map(|i| format!("t{}", i)).collect();
    let result = db
        .notes
        .create_bulk(vec![
            sample_note("three"),
            NewNote {
                tags: too_many,
                ..sample_note("four")
            },
        ])
        .await;
    assert!(result.is_err());
    assert_eq!(db.notes.count().await.unwrap(), 2);

    db.cleanup().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_create_capped_holds_under_concurrency() {
    let db = setup().await;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let notes = db.notes.clone();
        tasks.spawn(async move {
            notes
                .create_capped(sample_note(&format!("racer {}", i)), 3)
                .await
        });
    }

    let mut created = 0;
    let mut refused = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(dropnote_db::Error::CapacityReached { limit: 3 }) => refused += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!((created, refused), (3, 5));
    assert_eq!(db.notes.count().await.unwrap(), 3);

    db.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL server
async fn test_tag_and_search_match_ampersands() {
    let db = setup().await;

    db.notes
        .create(note_with("Tom & Jerry", &["R&D"], Visibility::Public))
        .await
        .unwrap();

    let by_tag = ListPublicNotesRequest::normalized(None, None, Some("R&D".to_string()), None, None);
    assert_eq!(db.notes.list_public(&by_tag).await.unwrap().total, 1);

    let by_search =
        ListPublicNotesRequest::normalized(None, None, None, Some("tom & jerry".to_string()), None);
    assert_eq!(db.notes.list_public(&by_search).await.unwrap().total, 1);

    assert_eq!(db.notes.public_tags().await.unwrap(), vec!["R&D"]);

    db.cleanup().await.unwrap();
}
