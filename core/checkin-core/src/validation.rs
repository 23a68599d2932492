//! Validation request stage.
//!
//! Resolves a scanned code against the backend and records the result in the
//! shared session. Decides feedback for every terminal outcome. Never starts
//! a check-in on its own; that belongs to the coordinator (continuous flow)
//! or to an explicit operator confirmation (standalone flow).

use std::sync::Arc;

use crate::backend::{with_timeout, BackendError, CheckinBackend};
use crate::feedback::FeedbackKind;
use crate::session::SessionHandle;
use crate::source::ScanLifecycle;
use crate::types::{RejectionCode, ScanCode, ValidationResult};

pub const MSG_TICKET_NOT_FOUND: &str = "Ticket not found";
pub const MSG_TICKET_NOT_CONFIRMED: &str =
    "This ticket is not confirmed and cannot be used for check-in";
pub const MSG_ALREADY_CHECKED_IN_TODAY: &str = "This ticket was already checked in today.";
pub const MSG_TICKET_CANCELLED: &str = "This ticket has been cancelled and cannot be checked in";
pub const MSG_VALIDATION_FAILED: &str = "Error validating ticket";

pub fn rejection_message(code: RejectionCode) -> &'static str {
    match code {
        RejectionCode::TicketNotFound => MSG_TICKET_NOT_FOUND,
        RejectionCode::TicketNotConfirmed => MSG_TICKET_NOT_CONFIRMED,
        RejectionCode::AlreadyCheckedInToday => MSG_ALREADY_CHECKED_IN_TODAY,
        RejectionCode::TicketCancelled => MSG_TICKET_CANCELLED,
    }
}

pub fn already_checked_in_message(attendee_name: &str) -> String {
    format!("Already checked in: {}", attendee_name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// The backend knows no ticket for this code.
    NotFound,
    AlreadyCheckedIn(Arc<ValidationResult>),
    /// Valid and not yet used; the lock stays held for check-in.
    Eligible(Arc<ValidationResult>),
    Rejected(RejectionCode),
    Failed(BackendError),
}

impl ValidationOutcome {
    pub fn eligible_ticket(&self) -> Option<&Arc<ValidationResult>> {
        match self {
            ValidationOutcome::Eligible(record) => Some(record),
            _ => None,
        }
    }

    pub fn releases_lock(&self) -> bool {
        self.eligible_ticket().is_none()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::NotFound => "not_found",
            ValidationOutcome::AlreadyCheckedIn(_) => "already_checked_in",
            ValidationOutcome::Eligible(_) => "eligible",
            ValidationOutcome::Rejected(_) => "rejected",
            ValidationOutcome::Failed(_) => "failed",
        }
    }
}

pub async fn validate<B: CheckinBackend>(
    backend: &B,
    session: &SessionHandle,
    code: &ScanCode,
    lifecycle: &ScanLifecycle,
) -> ValidationOutcome {
    if lifecycle.is_active() {
        session.update(|state| state.processing_validation = true);
    }

    let result = with_timeout(session.request_timeout(), backend.validate(code)).await;
    let outcome = match result {
        Ok(None) => ValidationOutcome::NotFound,
        Ok(Some(record)) if record.checked_in => {
            ValidationOutcome::AlreadyCheckedIn(Arc::new(record))
        }
        Ok(Some(record)) if record.ticket_id.trim().is_empty() => ValidationOutcome::Failed(
            BackendError::Malformed("validation result has no ticket id".to_string()),
        ),
        Ok(Some(record)) => ValidationOutcome::Eligible(Arc::new(record)),
        Err(BackendError::Rejected(rejection)) => ValidationOutcome::Rejected(rejection),
        Err(err) => ValidationOutcome::Failed(err),
    };

    if !lifecycle.is_active() {
        tracing::debug!(
            code = %code,
            outcome = outcome.label(),
            "Validation finished after scanning ended; result discarded"
        );
        return outcome;
    }

    tracing::info!(code = %code, outcome = outcome.label(), "Ticket validated");
    apply_outcome(session, &outcome);
    outcome
}

fn apply_outcome(session: &SessionHandle, outcome: &ValidationOutcome) {
    let feedback = session.feedback();
    match outcome {
        ValidationOutcome::NotFound => {
            clear_result(session);
            feedback.notify(MSG_TICKET_NOT_FOUND, FeedbackKind::Error);
        }
        ValidationOutcome::AlreadyCheckedIn(record) => {
            session.update(|state| {
                state.validation = Some(record.clone());
                state.processing_validation = false;
            });
            feedback.notify(
                &already_checked_in_message(&record.attendee_name),
                FeedbackKind::Error,
            );
        }
        ValidationOutcome::Eligible(record) => {
            session.update(|state| {
                state.validation = Some(record.clone());
                state.ticket_modal_open = true;
                state.processing_validation = false;
            });
            feedback.cue(FeedbackKind::Success);
        }
        ValidationOutcome::Rejected(rejection) => {
            clear_result(session);
            feedback.notify(rejection_message(*rejection), FeedbackKind::Error);
        }
        ValidationOutcome::Failed(err) => {
            tracing::warn!(error = %err, "Ticket validation failed");
            clear_result(session);
            feedback.notify(MSG_VALIDATION_FAILED, FeedbackKind::Error);
        }
    }
}

fn clear_result(session: &SessionHandle) {
    session.update(|state| {
        state.validation = None;
        state.processing_validation = false;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_are_operator_readable() {
        assert_eq!(
            rejection_message(RejectionCode::AlreadyCheckedInToday),
            "This ticket was already checked in today."
        );
        assert_eq!(
            rejection_message(RejectionCode::TicketNotFound),
            MSG_TICKET_NOT_FOUND
        );
    }

    #[test]
    fn only_eligible_outcome_holds_the_lock() {
        assert!(ValidationOutcome::NotFound.releases_lock());
        assert!(ValidationOutcome::Rejected(RejectionCode::TicketCancelled).releases_lock());
        assert!(
            ValidationOutcome::Failed(BackendError::Transport("down".into())).releases_lock()
        );
        let record = Arc::new(ValidationResult {
            ticket_id: "T-1".into(),
            attendee_name: "Ada".into(),
            checked_in: false,
            event: None,
            ticket_type: None,
            extra: Default::default(),
        });
        assert!(!ValidationOutcome::Eligible(record.clone()).releases_lock());
        assert!(ValidationOutcome::AlreadyCheckedIn(record).releases_lock());
    }
}
