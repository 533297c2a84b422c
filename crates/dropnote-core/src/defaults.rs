//! Centralized default constants for DropNote.
//!
//! Validation limits, pagination bounds and service defaults live here so
//! the API, the storage layer and the seeding tool agree on them.

// =============================================================================
// NOTE FIELDS
// =============================================================================

/// Maximum title length in characters, measured after sanitization.
pub const TITLE_MAX_CHARS: usize = 255;

/// Maximum content length in characters, measured after sanitization.
pub const CONTENT_MAX_CHARS: usize = 10_000;

/// Maximum length of a single tag in characters.
pub const TAG_MAX_CHARS: usize = 50;

/// Maximum number of tags per note. Mirrors the `ck_drop_note_tags_length`
/// table constraint.
pub const TAGS_MAX: usize = 10;

/// Prefix for generated usernames (`anonymous<N>`).
pub const ANONYMOUS_USERNAME_PREFIX: &str = "anonymous";

/// HTML elements allowed in note content. Attributes are never allowed.
pub const ALLOWED_CONTENT_TAGS: &[&str] = &[
    "p",
    "br",
    "b",
    "strong",
    "i",
    "em",
    "u",
    "s",
    "strike",
    "ul",
    "ol",
    "li",
    "blockquote",
    "code",
    "pre",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "span",
    "div",
];

/// Elements whose content is discarded entirely, not just unwrapped.
pub const DISCARDED_CONTENT_TAGS: &[&str] = &["script", "style"];

// =============================================================================
// MODIFICATION CODES
// =============================================================================

/// Number of hex characters in a modification code.
pub const MODIFICATION_CODE_LEN: usize = 8;

/// Insert attempts before a modification-code collision is reported as an error.
pub const MODIFICATION_CODE_ATTEMPTS: u32 = 3;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page number.
pub const PAGE: i64 = 1;

/// Default page size for the public note listing.
pub const PAGE_LIMIT: i64 = 10;

/// Upper bound on the page size.
pub const PAGE_LIMIT_MAX: i64 = 100;

// =============================================================================
// SERVICE
// =============================================================================

/// Total number of notes the service accepts.
pub const MAX_NOTES: i64 = 50;

/// Write requests (create/update/delete) allowed per client per day.
pub const WRITE_LIMIT_PER_DAY: u32 = 50;

/// Default HTTP port.
pub const PORT: u16 = 5000;

/// Default bind address.
pub const HOST: &str = "0.0.0.0";

/// Default CORS origin (the local frontend dev server).
pub const ALLOWED_ORIGINS: &str = "http://127.0.0.1:5333";

/// Maximum accepted request body in bytes.
pub const REQUEST_BODY_LIMIT: usize = 256 * 1024;
