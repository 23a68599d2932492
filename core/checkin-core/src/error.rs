//! Error types for checkin-core operations.
//!
//! Operator-facing failures (unknown tickets, rejections, transport trouble)
//! never surface as `CheckinError`; they are downgraded to feedback messages
//! by the request stages. `CheckinError` is reserved for failures the caller
//! must handle explicitly.

use std::path::PathBuf;

use crate::source::ScanSourceError;

/// All errors returned by checkin-core to its callers.
#[derive(Debug, thiserror::Error)]
pub enum CheckinError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration read failed: {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Home directory not found")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // Scan Source Lifecycle Errors (fatal to the scanning session)
    // ─────────────────────────────────────────────────────────────────────
    #[error("Scan source failed to start: {0}")]
    ScanSourceStart(#[source] ScanSourceError),

    #[error("Scan source failed to stop: {0}")]
    ScanSourceStop(#[source] ScanSourceError),
}

/// Convenience type alias for Results using CheckinError.
pub type Result<T> = std::result::Result<T, CheckinError>;

impl From<CheckinError> for String {
    fn from(err: CheckinError) -> String {
        err.to_string()
    }
}
