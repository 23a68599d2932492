//! Check-in request stage.
//!
//! Confirms attendance for the ticket currently held in the session. Without
//! a validated ticket there is nothing to confirm and no request is sent.

use std::sync::Arc;

use crate::backend::{with_timeout, BackendError, CheckinBackend};
use crate::feedback::FeedbackKind;
use crate::session::SessionHandle;
use crate::source::ScanLifecycle;
use crate::types::{CheckinReceipt, CheckinStatus};
use crate::validation::{already_checked_in_message, rejection_message};

pub const MSG_CHECKIN_FAILED: &str = "Error checking in ticket";

pub fn checked_in_message(attendee_name: &str) -> String {
    format!("Checked in: {}", attendee_name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckinOutcome {
    /// No validated ticket in the session; nothing was sent.
    Skipped,
    CheckedIn(CheckinReceipt),
    /// Another station confirmed the ticket first.
    AlreadyCheckedIn(CheckinReceipt),
    Failed(BackendError),
}

impl CheckinOutcome {
    /// True when the backend holds a check-in for the ticket, whoever made it.
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self,
            CheckinOutcome::CheckedIn(_) | CheckinOutcome::AlreadyCheckedIn(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckinOutcome::Skipped => "skipped",
            CheckinOutcome::CheckedIn(_) => "checked_in",
            CheckinOutcome::AlreadyCheckedIn(_) => "already_checked_in",
            CheckinOutcome::Failed(_) => "failed",
        }
    }
}

pub async fn check_in<B: CheckinBackend>(
    backend: &B,
    session: &SessionHandle,
    lifecycle: &ScanLifecycle,
) -> CheckinOutcome {
    let record = match session.validation_result() {
        Some(record) if !record.ticket_id.trim().is_empty() => record,
        _ => {
            tracing::debug!("Check-in skipped (no validated ticket)");
            return CheckinOutcome::Skipped;
        }
    };

    if lifecycle.is_active() && !session.begin_checkin() {
        tracing::debug!(ticket_id = %record.ticket_id, "Check-in skipped (already in flight)");
        return CheckinOutcome::Skipped;
    }

    let result = with_timeout(session.request_timeout(), backend.check_in(&record.ticket_id)).await;
    let outcome = match result {
        Ok(receipt) if receipt.status == CheckinStatus::CheckedIn => {
            CheckinOutcome::CheckedIn(receipt)
        }
        Ok(receipt) => CheckinOutcome::AlreadyCheckedIn(receipt),
        Err(err) => CheckinOutcome::Failed(err),
    };

    if !lifecycle.is_active() {
        tracing::debug!(
            ticket_id = %record.ticket_id,
            outcome = outcome.label(),
            "Check-in finished after scanning ended; result discarded"
        );
        return outcome;
    }

    tracing::info!(
        ticket_id = %record.ticket_id,
        outcome = outcome.label(),
        "Ticket check-in finished"
    );

    let feedback = session.feedback();
    match &outcome {
        CheckinOutcome::CheckedIn(receipt) | CheckinOutcome::AlreadyCheckedIn(receipt) => {
            let mut confirmed = (*record).clone();
            confirmed.checked_in = true;
            session.update(|state| {
                state.validation = Some(Arc::new(confirmed));
                state.last_receipt = Some(receipt.clone());
                state.ticket_modal_open = false;
                state.processing_checkin = false;
            });
            if receipt.status == CheckinStatus::CheckedIn {
                feedback.notify(
                    &checked_in_message(&record.attendee_name),
                    FeedbackKind::Success,
                );
            } else {
                feedback.notify(
                    &already_checked_in_message(&record.attendee_name),
                    FeedbackKind::Error,
                );
            }
        }
        CheckinOutcome::Failed(err) => {
            tracing::warn!(ticket_id = %record.ticket_id, error = %err, "Ticket check-in failed");
            session.update(|state| {
                state.processing_checkin = false;
                state.ticket_modal_open = false;
            });
            let message = err
                .rejection()
                .map(rejection_message)
                .unwrap_or(MSG_CHECKIN_FAILED);
            feedback.notify(message, FeedbackKind::Error);
        }
        CheckinOutcome::Skipped => {}
    }

    outcome
}
