//! # dropnote-db
//!
//! PostgreSQL storage layer for DropNote.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgNoteRepository`], the `NoteRepository` implementation
//! - Embedded migrations (behind the `migrations` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use dropnote_db::{Database, NewNote, NoteRepository, Visibility};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/dropnote").await?;
//!
//!     let created = db.notes.create(NewNote {
//!         title: "Hello".to_string(),
//!         content: "<p>world</p>".to_string(),
//!         username: None,
//!         tags: vec!["greeting".to_string()],
//!         visibility: Visibility::Public,
//!     }).await?;
//!
//!     println!("Created note {} with code {}", created.note.id, created.modification_code.as_str());
//!     Ok(())
//! }
//! ```
pub mod notes;
pub mod pool;

// Note: Always compiled so integration tests (in tests/) can use it
pub mod test_fixtures;

// Re-export core types
pub use dropnote_core::*;

pub use notes::PgNoteRepository;
pub use pool::{
    connect_with_options, create_pool, create_pool_with_config, log_pool_metrics, PoolConfig,
};

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Note repository.
    pub notes: PgNoteRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            notes: PgNoteRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with a custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
