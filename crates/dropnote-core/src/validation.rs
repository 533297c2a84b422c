//! Note input validation and sanitization.
//!
//! Input arrives as a raw JSON object so that an absent field, a `null`
//! field and a field of the wrong type can be told apart. Validation never
//! stops at the first problem: every field is checked and all messages are
//! returned together, keyed by field name.
//!
//! Sanitization rules:
//! - `content` keeps only [`ALLOWED_CONTENT_TAGS`] with no attributes;
//!   `script`/`style` bodies are dropped.
//! - `title`, `username` and each tag lose all markup.
//! - Every value is trimmed, and length limits apply to the sanitized text.
//! - A title or tag that is empty once stripped is an error, never dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::defaults::{
    ALLOWED_CONTENT_TAGS, CONTENT_MAX_CHARS, DISCARDED_CONTENT_TAGS, TAGS_MAX, TAG_MAX_CHARS,
    TITLE_MAX_CHARS,
};
use crate::models::{NewNote, NoteChanges, Visibility};

/// Whether input is for a new note or a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// `title` and `content` required; defaults applied for tags and visibility.
    Create,
    /// Every field optional; `username` is not updatable and is ignored.
    Update,
}

/// Field name → message, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid input: ")?;
        let joined = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

/// Fields that passed validation, already sanitized.
///
/// In [`ValidationMode::Create`] `tags` and `visibility` are always filled
/// with their defaults when absent from the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedFields {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `None` when absent or empty after stripping (create only).
    pub username: Option<String>,
    pub tags: Option<Vec<String>>,
    pub visibility: Option<Visibility>,
}

impl ValidatedFields {
    /// True when no recognized field was present.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.username.is_none()
            && self.tags.is_none()
            && self.visibility.is_none()
    }

    /// Convert create-mode output into a [`NewNote`].
    pub fn into_new_note(self) -> Result<NewNote, ValidationErrors> {
        match (self.title, self.content) {
            (Some(title), Some(content)) => Ok(NewNote {
                title,
                content,
                username: self.username,
                tags: self.tags.unwrap_or_default(),
                visibility: self.visibility.unwrap_or_default(),
            }),
            (title, content) => {
                let missing: Vec<&str> = [("title", title.is_none()), ("content", content.is_none())]
                    .into_iter()
                    .filter_map(|(name, absent)| absent.then_some(name))
                    .collect();
                let mut errors = ValidationErrors::default();
                errors.insert(
                    "required",
                    format!("Missing required fields: {}", missing.join(", ")),
                );
                Err(errors)
            }
        }
    }

    /// Convert update-mode output into [`NoteChanges`]. Username is dropped.
    pub fn into_changes(self) -> NoteChanges {
        NoteChanges {
            title: self.title,
            content: self.content,
            tags: self.tags,
            visibility: self.visibility,
        }
    }
}

/// Validate and sanitize raw note input.
///
/// Unknown keys (including `modification_code`) are ignored. In update mode
/// an `Ok` result may be empty; callers decide whether that is an error.
pub fn validate_note_input(
    raw: &Map<String, Value>,
    mode: ValidationMode,
) -> Result<ValidatedFields, ValidationErrors> {
    let mut fields = ValidatedFields::default();
    let mut errors = ValidationErrors::default();

    if mode == ValidationMode::Create {
        let missing: Vec<&str> = ["title", "content"]
            .into_iter()
            .filter(|name| is_missing(raw.get(*name)))
            .collect();
        if !missing.is_empty() {
            errors.insert(
                "required",
                format!("Missing required fields: {}", missing.join(", ")),
            );
        }
    }

    if let Some(value) = raw.get("title") {
        match validate_title(value) {
            Ok(title) => fields.title = Some(title),
            Err(message) => errors.insert("title", message),
        }
    }

    if let Some(value) = raw.get("content") {
        match validate_content(value) {
            Ok(content) => fields.content = Some(content),
            Err(message) => errors.insert("content", message),
        }
    }

    if mode == ValidationMode::Create {
        if let Some(value) = raw.get("username") {
            match validate_username(value) {
                Ok(username) => fields.username = username,
                Err(message) => errors.insert("username", message),
            }
        }
    }

    match raw.get("tags") {
        Some(value) => match validate_tags(value) {
            Ok(tags) => fields.tags = Some(tags),
            Err(message) => errors.insert("tags", message),
        },
        None if mode == ValidationMode::Create => fields.tags = Some(Vec::new()),
        None => {}
    }

    match raw.get("visibility") {
        Some(value) => match validate_visibility(value) {
            Ok(visibility) => fields.visibility = Some(visibility),
            Err(message) => errors.insert("visibility", message),
        },
        None if mode == ValidationMode::Create => fields.visibility = Some(Visibility::Public),
        None => {}
    }

    if errors.is_empty() {
        Ok(fields)
    } else {
        Err(errors)
    }
}

/// Validate create input straight into a [`NewNote`].
pub fn validate_new_note(raw: &Map<String, Value>) -> Result<NewNote, ValidationErrors> {
    validate_note_input(raw, ValidationMode::Create)?.into_new_note()
}

/// Validate update input into [`NoteChanges`]. The result may be empty.
pub fn validate_note_changes(raw: &Map<String, Value>) -> Result<NoteChanges, ValidationErrors> {
    Ok(validate_note_input(raw, ValidationMode::Update)?.into_changes())
}

// =============================================================================
// SANITIZERS
// =============================================================================

fn sanitizer(allowed_tags: &'static [&'static str]) -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::empty();
    builder
        .add_tags(allowed_tags)
        .clean_content_tags(DISCARDED_CONTENT_TAGS.iter().copied().collect());
    builder
}

/// Reduce rich-text content to the allowed formatting tags, without attributes.
pub fn sanitize_content(raw: &str) -> String {
    sanitizer(ALLOWED_CONTENT_TAGS)
        .clean(raw)
        .to_string()
        .trim()
        .to_string()
}

/// Remove all markup, keeping plain text.
///
/// The result is text, not HTML: entities are decoded, so `&`, `<` and `>`
/// are stored as typed and length limits count real characters.
pub fn strip_markup(raw: &str) -> String {
    let cleaned = sanitizer(&[]).clean(raw).to_string();
    html_escape::decode_html_entities(&cleaned).trim().to_string()
}

// =============================================================================
// FIELD VALIDATORS
// =============================================================================

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn validate_title(value: &Value) -> Result<String, String> {
    let Some(raw) = value.as_str().filter(|s| !s.is_empty()) else {
        return Err("Title must be a non-empty string".to_string());
    };
    let title = strip_markup(raw);
    if title.is_empty() {
        return Err("Title must not be empty after removing markup".to_string());
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(format!(
            "Title must be at most {} characters",
            TITLE_MAX_CHARS
        ));
    }
    Ok(title)
}

fn validate_content(value: &Value) -> Result<String, String> {
    let Some(raw) = value.as_str().filter(|s| !s.is_empty()) else {
        return Err("Content must be a non-empty string".to_string());
    };
    let content = sanitize_content(raw);
    if content.is_empty() {
        return Err("Content must not be empty after sanitization".to_string());
    }
    if content.chars().count() > CONTENT_MAX_CHARS {
        return Err(format!(
            "Content must be at most {} characters",
            CONTENT_MAX_CHARS
        ));
    }
    Ok(content)
}

/// `Ok(None)` means "generate an anonymous username".
fn validate_username(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(raw) => {
            let username = strip_markup(raw);
            Ok((!username.is_empty()).then_some(username))
        }
        _ => Err("Username must be a string".to_string()),
    }
}

fn validate_tags(value: &Value) -> Result<Vec<String>, String> {
    let Some(items) = value.as_array() else {
        return Err("Tags must be a list of strings".to_string());
    };
    if items.len() > TAGS_MAX {
        return Err(format!("Maximum of {} tags allowed", TAGS_MAX));
    }

    let mut tags = Vec::with_capacity(items.len());
    for item in items {
        let Some(raw) = item.as_str() else {
            return Err("All tags must be strings".to_string());
        };
        let tag = strip_markup(raw);
        if tag.is_empty() {
            return Err("Tags must not be empty after removing markup".to_string());
        }
        if tag.chars().count() > TAG_MAX_CHARS {
            return Err(format!(
                "Each tag must be at most {} characters",
                TAG_MAX_CHARS
            ));
        }
        tags.push(tag);
    }
    Ok(tags)
}

fn validate_visibility(value: &Value) -> Result<Visibility, String> {
    value
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| "Visibility must be 'public' or 'private'".to_string())
}
