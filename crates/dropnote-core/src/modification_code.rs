//! Modification codes: per-note bearer secrets that authorize update and delete.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::defaults::MODIFICATION_CODE_LEN;

/// Opaque write credential for a single note.
///
/// Generated from the OS random source as lowercase hex. `Debug` output is
/// redacted so codes do not end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(transparent)]
pub struct ModificationCode(String);

impl ModificationCode {
    /// Generate a fresh random code.
    pub fn generate() -> Self {
        let mut bytes = [0u8; MODIFICATION_CODE_LEN / 2];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a code read back from storage.
    pub fn from_stored(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a client-supplied code in constant time.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl fmt::Debug for ModificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ModificationCode(..)")
    }
}
