//! Error types for DropNote.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias using DropNote's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for DropNote operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input that is not tied to a single note field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// One or more note fields failed validation
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Modification code did not match
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The configured note cap has been reached
    #[error("Note limit reached: {limit} notes")]
    CapacityReached { limit: i64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}
