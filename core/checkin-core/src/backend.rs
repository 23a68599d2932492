//! Backend contract consumed by the request stages.
//!
//! Transport is the implementor's concern; the scan-station binary talks to a
//! Unix socket, tests use in-memory fakes.

use std::time::Duration;

use crate::types::{CheckinReceipt, RejectionCode, ScanCode, ValidationResult};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Ticket rejected by backend: {0:?}")]
    Rejected(RejectionCode),

    #[error("Backend transport failed: {0}")]
    Transport(String),

    #[error("Backend request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Backend response malformed: {0}")]
    Malformed(String),

    #[error("Backend error {code}: {message}")]
    Remote { code: String, message: String },
}

impl BackendError {
    pub fn rejection(&self) -> Option<RejectionCode> {
        match self {
            BackendError::Rejected(code) => Some(*code),
            _ => None,
        }
    }
}

/// The two remote operations a check-in station needs.
///
/// Futures are awaited on the coordinator's own task, so they need not be
/// `Send`.
#[allow(async_fn_in_trait)]
pub trait CheckinBackend {
    /// Resolves a scanned code. `Ok(None)` means no ticket matches.
    async fn validate(&self, code: &ScanCode) -> Result<Option<ValidationResult>, BackendError>;

    /// Confirms attendance for a previously validated ticket.
    async fn check_in(&self, ticket_id: &str) -> Result<CheckinReceipt, BackendError>;
}

impl<B: CheckinBackend> CheckinBackend for &B {
    async fn validate(&self, code: &ScanCode) -> Result<Option<ValidationResult>, BackendError> {
        (**self).validate(code).await
    }

    async fn check_in(&self, ticket_id: &str) -> Result<CheckinReceipt, BackendError> {
        (**self).check_in(ticket_id).await
    }
}

/// Runs a backend call with an upper bound, mapping expiry to
/// [`BackendError::TimedOut`].
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: std::future::Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::TimedOut(limit)),
    }
}
