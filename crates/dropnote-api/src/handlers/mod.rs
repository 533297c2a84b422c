//! HTTP handlers for dropnote-api.

pub mod notes;
pub mod system;
pub mod tags;
