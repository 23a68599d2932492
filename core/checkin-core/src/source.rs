//! Scan source contract.
//!
//! A source (camera decoder, HID scanner wedge, stdin) pushes decoded text
//! into a bounded channel through a [`ScanSink`]. It may emit the same code
//! many times per second while the code stays in view; filtering that is the
//! coordinator's job, not the source's.

use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::types::ScanCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    #[default]
    Environment,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub facing: Facing,
    pub sampling_rate_hz: u32,
    pub decode_window_px: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Decoded(ScanCode),
    DecodeError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanSourceError {
    #[error("scan source unavailable: {0}")]
    Unavailable(String),

    #[error("scan source already started")]
    AlreadyStarted,

    #[error("scan source failed: {0}")]
    Failed(String),
}

/// Push end handed to a [`ScanSource`] on start.
#[derive(Debug, Clone)]
pub struct ScanSink {
    tx: mpsc::Sender<ScanEvent>,
}

impl ScanSink {
    /// Offers a decoded frame. Never blocks: a full channel drops the frame,
    /// which only happens while the coordinator is busy and would discard it
    /// anyway. Returns false when the frame was not delivered.
    pub fn decoded(&self, text: impl AsRef<str>) -> bool {
        match ScanCode::new(text) {
            Some(code) => self.tx.try_send(ScanEvent::Decoded(code)).is_ok(),
            None => false,
        }
    }

    pub fn decode_error(&self, message: impl Into<String>) -> bool {
        self.tx
            .try_send(ScanEvent::DecodeError(message.into()))
            .is_ok()
    }

    /// True once the coordinator has stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Creates the bounded scan channel. `capacity` is clamped to at least 1.
pub fn scan_channel(capacity: usize) -> (ScanSink, mpsc::Receiver<ScanEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ScanSink { tx }, rx)
}

/// Producer of decoded codes with its own start/stop lifecycle.
#[allow(async_fn_in_trait)]
pub trait ScanSource {
    async fn start(&mut self, options: &ScanOptions, sink: ScanSink) -> Result<(), ScanSourceError>;
    async fn stop(&mut self) -> Result<(), ScanSourceError>;
}

/// Requests the end of a scanning session.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop is requested. Never resolves if every
    /// [`StopHandle`] is dropped without stopping.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Whether the surface that started a request still wants its results.
///
/// Requests are never cancelled mid-flight; when they finish after the
/// session ended they must leave UI-visible state alone.
#[derive(Debug, Clone)]
pub struct ScanLifecycle {
    active: Arc<AtomicBool>,
}

impl ScanLifecycle {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for ScanLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_ignores_blank_frames() {
        let (sink, mut rx) = scan_channel(4);
        assert!(!sink.decoded("   "));
        assert!(sink.decoded(" TKT-1 "));
        assert_eq!(
            rx.recv().await,
            Some(ScanEvent::Decoded(ScanCode::new("TKT-1").unwrap()))
        );
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (sink, _rx) = scan_channel(1);
        assert!(sink.decoded("A"));
        assert!(!sink.decoded("B"));
    }

    #[tokio::test]
    async fn stop_signal_resolves_after_stop() {
        let (handle, mut signal) = stop_channel();
        assert!(!signal.is_requested());
        handle.stop();
        signal.requested().await;
        assert!(signal.is_requested());
    }

    #[test]
    fn lifecycle_deactivates_all_clones() {
        let lifecycle = ScanLifecycle::new();
        let clone = lifecycle.clone();
        lifecycle.deactivate();
        assert!(!clone.is_active());
    }
}
