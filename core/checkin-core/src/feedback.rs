//! Operator feedback: audio cues and de-duplicated toasts.
//!
//! A camera keeps decoding the same code for as long as it stays in view, so
//! the same outcome can be reported several times a second. Cues always play;
//! toasts go through [`ToastDebouncer`] so an identical message inside the
//! debounce window shows once.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Error,
}

/// Rendering end of the feedback channel (speaker, terminal, toast widget).
pub trait FeedbackSink: Send + Sync {
    fn play_cue(&self, kind: FeedbackKind);
    fn show_toast(&self, message: &str, kind: FeedbackKind);
}

/// Last-message dedupe state.
#[derive(Debug)]
pub struct ToastDebouncer {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl ToastDebouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns false iff `message` equals the last emitted message and the
    /// last emission is younger than the window. Records the emission
    /// otherwise.
    pub fn should_emit(&mut self, message: &str, now: Instant) -> bool {
        if let Some((last_message, last_time)) = &self.last {
            if last_message == message && now.saturating_duration_since(*last_time) < self.window
            {
                return false;
            }
        }
        self.last = Some((message.to_string(), now));
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Debounced feedback channel shared by both request stages.
#[derive(Clone)]
pub struct Feedback {
    sink: Arc<dyn FeedbackSink>,
    debouncer: Arc<Mutex<ToastDebouncer>>,
}

impl Feedback {
    pub fn new(sink: Arc<dyn FeedbackSink>, debounce_window: Duration) -> Self {
        Self {
            sink,
            debouncer: Arc::new(Mutex::new(ToastDebouncer::new(debounce_window))),
        }
    }

    pub fn cue(&self, kind: FeedbackKind) {
        self.sink.play_cue(kind);
    }

    /// Shows `message` unless it was shown within the debounce window.
    /// Returns whether the toast was emitted.
    pub fn toast(&self, message: &str, kind: FeedbackKind) -> bool {
        let now = Instant::now();
        let emit = match self.debouncer.lock() {
            Ok(mut debouncer) => debouncer.should_emit(message, now),
            Err(poisoned) => poisoned.into_inner().should_emit(message, now),
        };

        if emit {
            self.sink.show_toast(message, kind);
        } else {
            tracing::trace!(message, "Toast suppressed (debounced)");
        }
        emit
    }

    /// Cue plus debounced toast. The cue plays even when the toast is
    /// suppressed.
    pub fn notify(&self, message: &str, kind: FeedbackKind) -> bool {
        self.cue(kind);
        self.toast(message, kind)
    }

    pub fn reset(&self) {
        match self.debouncer.lock() {
            Ok(mut debouncer) => debouncer.reset(),
            Err(poisoned) => poisoned.into_inner().reset(),
        }
    }
}
