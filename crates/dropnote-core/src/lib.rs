//! # dropnote-core
//!
//! Core types, traits, and validation for the DropNote note-sharing service.
//!
//! This crate provides the note model, the input validation and sanitization
//! rules shared by the HTTP API and the seeding tool, modification-code
//! handling, and the [`NoteRepository`] trait implemented by the storage layer.

pub mod defaults;
pub mod error;
pub mod logging;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod modification_code;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use modification_code::ModificationCode;
pub use traits::*;
pub use validation::{
    sanitize_content, strip_markup, validate_new_note, validate_note_changes,
    validate_note_input, ValidatedFields, ValidationErrors, ValidationMode,
};
