//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use checkin_core::{
    BackendError, CheckinBackend, CheckinConfig, CheckinReceipt, CheckinStatus, FeedbackKind,
    FeedbackSink, RejectionCode, ScanCode, ScanOptions, ScanSink, ScanSource, ScanSourceError,
    SessionHandle, TimingConfig, ValidationResult,
};

pub fn ticket(ticket_id: &str, attendee_name: &str, checked_in: bool) -> ValidationResult {
    ValidationResult {
        ticket_id: ticket_id.to_string(),
        attendee_name: attendee_name.to_string(),
        checked_in,
        event: Some("Spring Gala".to_string()),
        ticket_type: Some("General".to_string()),
        extra: Default::default(),
    }
}

pub fn timing() -> TimingConfig {
    TimingConfig {
        debounce_window_ms: 500,
        settle_delay_ms: 1500,
        request_timeout_ms: 10_000,
    }
}

pub fn config(timing: TimingConfig) -> CheckinConfig {
    CheckinConfig {
        timing,
        ..CheckinConfig::default()
    }
}

pub fn session(feedback: &Arc<RecordingFeedback>, timing: &TimingConfig) -> SessionHandle {
    SessionHandle::new(feedback.clone(), timing)
}

pub async fn advance_to(start: tokio::time::Instant, offset_ms: u64) {
    tokio::time::sleep_until(start + Duration::from_millis(offset_ms)).await;
}

// ─────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────

enum Lookup {
    Ticket(ValidationResult),
    Error(BackendError),
}

/// Scripted backend. Tickets flip to checked in once a check-in succeeds,
/// so re-validating the same code reports "already checked in".
#[derive(Default)]
pub struct MockBackend {
    lookups: Mutex<HashMap<String, Lookup>>,
    checked_in: Mutex<HashSet<String>>,
    checkin_error: Mutex<Option<BackendError>>,
    validate_delay: Duration,
    checkin_delay: Duration,
    validate_calls: Mutex<Vec<String>>,
    checkin_calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delays(validate_ms: u64, checkin_ms: u64) -> Self {
        Self {
            validate_delay: Duration::from_millis(validate_ms),
            checkin_delay: Duration::from_millis(checkin_ms),
            ..Self::default()
        }
    }

    pub fn add_ticket(&self, code: &str, record: ValidationResult) {
        if record.checked_in {
            self.checked_in
                .lock()
                .unwrap()
                .insert(record.ticket_id.clone());
        }
        self.lookups
            .lock()
            .unwrap()
            .insert(code.to_string(), Lookup::Ticket(record));
    }

    pub fn reject(&self, code: &str, rejection: RejectionCode) {
        self.fail_validate(code, BackendError::Rejected(rejection));
    }

    pub fn fail_validate(&self, code: &str, err: BackendError) {
        self.lookups
            .lock()
            .unwrap()
            .insert(code.to_string(), Lookup::Error(err));
    }

    pub fn fail_checkin(&self, err: BackendError) {
        *self.checkin_error.lock().unwrap() = Some(err);
    }

    pub fn heal_checkin(&self) {
        *self.checkin_error.lock().unwrap() = None;
    }

    /// Simulates another station checking the ticket in first.
    pub fn mark_checked_in_elsewhere(&self, ticket_id: &str) {
        self.checked_in
            .lock()
            .unwrap()
            .insert(ticket_id.to_string());
    }

    pub fn validate_calls(&self) -> Vec<String> {
        self.validate_calls.lock().unwrap().clone()
    }

    pub fn checkin_calls(&self) -> Vec<String> {
        self.checkin_calls.lock().unwrap().clone()
    }
}

impl CheckinBackend for MockBackend {
    async fn validate(&self, code: &ScanCode) -> Result<Option<ValidationResult>, BackendError> {
        self.validate_calls
            .lock()
            .unwrap()
            .push(code.as_str().to_string());
        if !self.validate_delay.is_zero() {
            tokio::time::sleep(self.validate_delay).await;
        }

        let lookups = self.lookups.lock().unwrap();
        match lookups.get(code.as_str()) {
            None => Ok(None),
            Some(Lookup::Error(err)) => Err(err.clone()),
            Some(Lookup::Ticket(record)) => {
                let mut record = record.clone();
                record.checked_in = self.checked_in.lock().unwrap().contains(&record.ticket_id);
                Ok(Some(record))
            }
        }
    }

    async fn check_in(&self, ticket_id: &str) -> Result<CheckinReceipt, BackendError> {
        self.checkin_calls
            .lock()
            .unwrap()
            .push(ticket_id.to_string());
        if !self.checkin_delay.is_zero() {
            tokio::time::sleep(self.checkin_delay).await;
        }

        if let Some(err) = self.checkin_error.lock().unwrap().clone() {
            return Err(err);
        }
        let newly = self
            .checked_in
            .lock()
            .unwrap()
            .insert(ticket_id.to_string());
        Ok(CheckinReceipt {
            ticket_id: ticket_id.to_string(),
            status: if newly {
                CheckinStatus::CheckedIn
            } else {
                CheckinStatus::AlreadyCheckedIn
            },
            checked_in_at: None,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Feedback
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingFeedback {
    cues: Mutex<Vec<FeedbackKind>>,
    toasts: Mutex<Vec<(String, FeedbackKind)>>,
}

impl RecordingFeedback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cues(&self) -> Vec<FeedbackKind> {
        self.cues.lock().unwrap().clone()
    }

    pub fn toasts(&self) -> Vec<String> {
        self.toasts
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    pub fn toast_kinds(&self) -> Vec<FeedbackKind> {
        self.toasts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, kind)| *kind)
            .collect()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn play_cue(&self, kind: FeedbackKind) {
        self.cues.lock().unwrap().push(kind);
    }

    fn show_toast(&self, message: &str, kind: FeedbackKind) {
        self.toasts
            .lock()
            .unwrap()
            .push((message.to_string(), kind));
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Scan source
// ─────────────────────────────────────────────────────────────────────────

/// Source driven by the test through a [`FeedHandle`].
#[derive(Default)]
pub struct FeedSource {
    sink: Arc<Mutex<Option<ScanSink>>>,
    options: Arc<Mutex<Option<ScanOptions>>>,
    stop_calls: Arc<Mutex<u32>>,
    fail_start: Option<ScanSourceError>,
    fail_stop: Option<ScanSourceError>,
}

#[derive(Clone)]
pub struct FeedHandle {
    sink: Arc<Mutex<Option<ScanSink>>>,
    options: Arc<Mutex<Option<ScanOptions>>>,
    stop_calls: Arc<Mutex<u32>>,
}

impl FeedSource {
    pub fn new() -> (Self, FeedHandle) {
        let source = Self::default();
        let handle = FeedHandle {
            sink: source.sink.clone(),
            options: source.options.clone(),
            stop_calls: source.stop_calls.clone(),
        };
        (source, handle)
    }

    pub fn failing_start(err: ScanSourceError) -> (Self, FeedHandle) {
        let (mut source, handle) = Self::new();
        source.fail_start = Some(err);
        (source, handle)
    }

    pub fn failing_stop(err: ScanSourceError) -> (Self, FeedHandle) {
        let (mut source, handle) = Self::new();
        source.fail_stop = Some(err);
        (source, handle)
    }
}

impl ScanSource for FeedSource {
    async fn start(&mut self, options: &ScanOptions, sink: ScanSink) -> Result<(), ScanSourceError> {
        if let Some(err) = self.fail_start.clone() {
            return Err(err);
        }
        *self.options.lock().unwrap() = Some(options.clone());
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ScanSourceError> {
        *self.stop_calls.lock().unwrap() += 1;
        self.sink.lock().unwrap().take();
        match self.fail_stop.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl FeedHandle {
    /// Pushes one decoded frame. False if the source is not running or the
    /// channel rejected it.
    pub fn scan(&self, code: &str) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.decoded(code),
            None => false,
        }
    }

    pub fn decode_error(&self, message: &str) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.decode_error(message),
            None => false,
        }
    }

    /// Drops the push end, as a source does when its input is exhausted.
    pub fn end(&self) {
        self.sink.lock().unwrap().take();
    }

    pub fn options(&self) -> Option<ScanOptions> {
        self.options.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> u32 {
        *self.stop_calls.lock().unwrap()
    }
}
