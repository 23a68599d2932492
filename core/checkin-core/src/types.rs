//! Shared data types.
//!
//! Wire-level records (`ValidationResult`, `CheckinReceipt`, `RejectionCode`)
//! live in `checkin-protocol` and are re-exported here so operator surfaces
//! only depend on this crate.

use std::fmt;

pub use checkin_protocol::{CheckinReceipt, CheckinStatus, RejectionCode, ValidationResult};

/// A decoded string from the scan source.
///
/// Always trimmed and non-empty. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanCode(String);

impl ScanCode {
    /// Returns `None` for blank input; decoders occasionally report empty
    /// frames and those are not scans.
    pub fn new(text: impl AsRef<str>) -> Option<Self> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
