//! Bulk loading of notes from a JSON file, used by `dropnote-seed`.
//!
//! The file holds an array of objects shaped like the create request body.
//! Every entry goes through the same validation as `POST /api/notes`.

use serde_json::Value;
use thiserror::Error;

use dropnote_core::{validate_new_note, NewNote};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Seed file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Seed file must contain a JSON array of notes")]
    NotAnArray,

    #[error("Seed file contains no notes")]
    Empty,

    #[error("Invalid seed entries:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),

    #[error("Loading {incoming} notes onto {existing} existing would exceed the cap of {max}")]
    OverCapacity {
        existing: i64,
        incoming: usize,
        max: i64,
    },
}

/// Parse and validate every entry. Reports all bad entries at once,
/// numbered from 1.
pub fn parse_seed_notes(raw: &str) -> Result<Vec<NewNote>, SeedError> {
    let Value::Array(entries) = serde_json::from_str::<Value>(raw)? else {
        return Err(SeedError::NotAnArray);
    };
    if entries.is_empty() {
        return Err(SeedError::Empty);
    }

    let mut notes = Vec::with_capacity(entries.len());
    let mut problems = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let Some(object) = entry.as_object() else {
            problems.push(format!("entry {}: not a JSON object", i + 1));
            continue;
        };
        match validate_new_note(object) {
            Ok(note) => notes.push(note),
            Err(errors) => problems.push(format!("entry {}: {}", i + 1, errors)),
        }
    }

    if problems.is_empty() {
        Ok(notes)
    } else {
        Err(SeedError::Invalid(problems))
    }
}

/// Refuse a batch that would push the table past `max`.
pub fn check_capacity(existing: i64, incoming: usize, max: i64) -> Result<(), SeedError> {
    let total = existing.saturating_add(i64::try_from(incoming).unwrap_or(i64::MAX));
    if total > max {
        return Err(SeedError::OverCapacity {
            existing,
            incoming,
            max,
        });
    }
    Ok(())
}
