//! Shared session state.
//!
//! One [`SessionHandle`] is created per operator session and cloned into every
//! surface that needs check-in status (continuous scanner, ticket review
//! screen). The handle is the single source of truth: surfaces read
//! snapshots or subscribe for changes and never cache results on their own.
//!
//! The handle also exposes the standalone flow: validate a code, show the
//! ticket, and check in only when the operator confirms.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::backend::CheckinBackend;
use crate::checkin::{self, CheckinOutcome};
use crate::config::TimingConfig;
use crate::feedback::{Feedback, FeedbackSink};
use crate::lock::LockPhase;
use crate::source::ScanLifecycle;
use crate::types::{CheckinReceipt, ScanCode, ValidationResult};
use crate::validation::{self, ValidationOutcome};

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Latest validated ticket. Shared, so every reader sees the same
    /// instance until the next validation or clear.
    pub validation: Option<Arc<ValidationResult>>,
    pub processing_validation: bool,
    pub processing_checkin: bool,
    pub ticket_modal_open: bool,
    pub last_receipt: Option<CheckinReceipt>,
    pub lock_phase: LockPhase,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            validation: None,
            processing_validation: false,
            processing_checkin: false,
            ticket_modal_open: false,
            last_receipt: None,
            lock_phase: LockPhase::Idle,
        }
    }
}

#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: watch::Sender<SessionSnapshot>,
    feedback: Feedback,
    request_timeout: Duration,
}

impl SessionHandle {
    pub fn new(sink: Arc<dyn FeedbackSink>, timing: &TimingConfig) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(SessionInner {
                state,
                feedback: Feedback::new(sink, timing.debounce_window()),
                request_timeout: timing.request_timeout(),
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver that wakes on every state change, for surfaces that render
    /// out-of-band updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn validation_result(&self) -> Option<Arc<ValidationResult>> {
        self.inner.state.borrow().validation.clone()
    }

    pub fn feedback(&self) -> &Feedback {
        &self.inner.feedback
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Standalone flow, step one: look up a code and show the ticket.
    pub async fn validate_ticket<B: CheckinBackend>(
        &self,
        backend: &B,
        code: &ScanCode,
    ) -> ValidationOutcome {
        validation::validate(backend, self, code, &ScanLifecycle::new()).await
    }

    /// Standalone flow, step two: the operator confirmed the shown ticket.
    pub async fn check_in_ticket<B: CheckinBackend>(&self, backend: &B) -> CheckinOutcome {
        checkin::check_in(backend, self, &ScanLifecycle::new()).await
    }

    /// Drops the current result and resets every in-flight indicator.
    pub fn clear_results(&self) {
        self.update(|state| {
            state.validation = None;
            state.processing_validation = false;
            state.processing_checkin = false;
            state.ticket_modal_open = false;
        });
    }

    pub fn close_modal(&self) {
        self.update(|state| state.ticket_modal_open = false);
    }

    pub(crate) fn update(&self, apply: impl FnOnce(&mut SessionSnapshot)) {
        self.inner.state.send_modify(apply);
    }

    /// Marks a check-in as in flight. Returns false if one already is, so
    /// a second confirmation of the same ticket sends nothing.
    pub(crate) fn begin_checkin(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.processing_checkin {
                false
            } else {
                state.processing_checkin = true;
                true
            }
        })
    }

    pub(crate) fn publish_lock_phase(&self, phase: LockPhase) {
        self.inner.state.send_if_modified(|state| {
            if state.lock_phase == phase {
                false
            } else {
                state.lock_phase = phase;
                true
            }
        });
    }

    /// Called when a scanning session stops: nothing may look in flight.
    pub(crate) fn end_scan_session(&self) {
        self.update(|state| {
            state.processing_validation = false;
            state.processing_checkin = false;
            state.ticket_modal_open = false;
            state.lock_phase = LockPhase::Idle;
        });
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &*self.inner.state.borrow())
            .field("request_timeout", &self.inner.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackKind;
    use serde_json::Map;

    struct Silent;

    impl FeedbackSink for Silent {
        fn play_cue(&self, _kind: FeedbackKind) {}
        fn show_toast(&self, _message: &str, _kind: FeedbackKind) {}
    }

    fn handle() -> SessionHandle {
        SessionHandle::new(Arc::new(Silent), &TimingConfig::default())
    }

    fn ticket() -> Arc<ValidationResult> {
        Arc::new(ValidationResult {
            ticket_id: "T-1".to_string(),
            attendee_name: "Ada".to_string(),
            checked_in: false,
            event: None,
            ticket_type: None,
            extra: Map::new(),
        })
    }

    #[test]
    fn clones_share_one_state() {
        let session = handle();
        let other_surface = session.clone();
        let record = ticket();
        session.update(|state| {
            state.validation = Some(record.clone());
            state.ticket_modal_open = true;
        });

        let seen = other_surface.validation_result().expect("result visible");
        assert!(Arc::ptr_eq(&seen, &record));
        assert!(other_surface.snapshot().ticket_modal_open);
    }

    #[test]
    fn clear_results_resets_everything_visible() {
        let session = handle();
        session.update(|state| {
            state.validation = Some(ticket());
            state.processing_checkin = true;
            state.ticket_modal_open = true;
        });

        session.clear_results();
        let snapshot = session.snapshot();
        assert!(snapshot.validation.is_none());
        assert!(!snapshot.processing_checkin);
        assert!(!snapshot.ticket_modal_open);
    }

    #[test]
    fn close_modal_keeps_result() {
        let session = handle();
        session.update(|state| {
            state.validation = Some(ticket());
            state.ticket_modal_open = true;
        });

        session.close_modal();
        let snapshot = session.snapshot();
        assert!(snapshot.validation.is_some());
        assert!(!snapshot.ticket_modal_open);
    }

    #[test]
    fn begin_checkin_claims_once() {
        let session = handle();
        assert!(session.begin_checkin());
        assert!(!session.clone().begin_checkin());

        session.clear_results();
        assert!(session.begin_checkin());
    }

    #[tokio::test]
    async fn subscribers_see_out_of_band_updates() {
        let session = handle();
        let mut rx = session.subscribe();
        session.publish_lock_phase(LockPhase::Validating);
        rx.changed().await.expect("sender alive");
        assert_eq!(rx.borrow().lock_phase, LockPhase::Validating);
    }
}
