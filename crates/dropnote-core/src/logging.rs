//! Structured logging field names shared by all DropNote crates.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Storage failure or unexpected state, surfaced to the client as 500 |
//! | WARN  | Recoverable issue (quota exceeded, wrong modification code, racing delete) |
//! | INFO  | Lifecycle events and completed writes |
//! | DEBUG | Query shapes, applied sort/filter, pool metrics |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID attached to every HTTP request (UUIDv7).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event. Values: "api", "database", "seed"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem. Examples: "pool", "notes", "write_quota"
pub const COMPONENT: &str = "component";

/// Logical operation name. Examples: "create", "list_public", "delete"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Client address used for write quotas.
pub const CLIENT_IP: &str = "client_ip";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
