//! Terminal rendering of operator feedback.
//!
//! Toasts are lines on stdout. Cues are terminal bells on stderr: one for
//! success, two for an error, so an operator looking at the queue instead of
//! the screen can still tell them apart.

use checkin_core::{FeedbackKind, FeedbackSink};
use std::io::{self, Write};

const BELL: &str = "\x07";

pub struct TerminalFeedback {
    audible: bool,
}

impl TerminalFeedback {
    pub fn new(audible: bool) -> Self {
        Self { audible }
    }
}

impl FeedbackSink for TerminalFeedback {
    fn play_cue(&self, kind: FeedbackKind) {
        if !self.audible {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(cue_bells(kind).as_bytes());
        let _ = stderr.flush();
    }

    fn show_toast(&self, message: &str, kind: FeedbackKind) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", format_toast(message, kind));
        let _ = stdout.flush();
    }
}

fn cue_bells(kind: FeedbackKind) -> String {
    match kind {
        FeedbackKind::Success => BELL.to_string(),
        FeedbackKind::Error => BELL.repeat(2),
    }
}

pub fn format_toast(message: &str, kind: FeedbackKind) -> String {
    match kind {
        FeedbackKind::Success => format!("✔ {}", message),
        FeedbackKind::Error => format!("✖ {}", message),
    }
}
