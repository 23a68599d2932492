//! Continuous-scan coordinator.
//!
//! Owns the scan lock for one scanning session and drives each accepted scan
//! through validation and, for eligible tickets, check-in. Scans that arrive
//! while the lock is held are read off the channel and dropped, so nothing
//! queues up behind an in-flight request.
//!
//! # Lock release
//!
//! | Validation outcome | Release |
//! |---|---|
//! | not found / already checked in / rejected / failed | immediate |
//! | eligible → check-in confirmed | after the settle delay |
//! | eligible → check-in failed or timed out | immediate |
//!
//! The settle delay absorbs frames of the code that was just checked in and
//! is still in front of the camera.

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::backend::CheckinBackend;
use crate::checkin::{self, CheckinOutcome};
use crate::config::{CheckinConfig, ScannerConfig};
use crate::error::{CheckinError, Result};
use crate::lock::{LockEvent, LockPhase, ScanLock};
use crate::session::SessionHandle;
use crate::source::{scan_channel, ScanEvent, ScanLifecycle, ScanSource, StopSignal};
use crate::types::ScanCode;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A [`crate::source::StopHandle`] asked for the session to end.
    Requested,
    /// The source closed its end of the channel.
    SourceEnded,
}

/// Counters for one scanning session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub accepted: u64,
    pub dropped: u64,
    pub decode_errors: u64,
    pub checked_in: u64,
    pub stop_reason: Option<StopReason>,
}

pub struct ScanCoordinator<B> {
    backend: B,
    session: SessionHandle,
    lock: ScanLock,
    scanner: ScannerConfig,
}

impl<B: CheckinBackend> ScanCoordinator<B> {
    pub fn new(backend: B, session: SessionHandle, config: &CheckinConfig) -> Self {
        Self {
            backend,
            session,
            lock: ScanLock::new(config.timing.settle_delay()),
            scanner: config.scanner.clone(),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn lock_phase(&self) -> LockPhase {
        self.lock.phase()
    }

    /// Runs one scanning session: starts `source`, processes scans until
    /// `stop` fires or the source ends, then stops the source.
    ///
    /// Only source lifecycle failures are returned as errors. The lock is
    /// back to idle whenever this returns.
    pub async fn run<S: ScanSource>(
        &mut self,
        source: &mut S,
        mut stop: StopSignal,
    ) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let (sink, mut events) = scan_channel(self.scanner.channel_capacity);
        let options = self.scanner.scan_options();
        let lifecycle = ScanLifecycle::new();
        self.reset_lock();

        if let Err(err) = source.start(&options, sink).await {
            tracing::error!(error = %err, "Scan source failed to start");
            self.session.end_scan_session();
            return Err(CheckinError::ScanSourceStart(err));
        }

        tracing::info!(
            facing = ?options.facing,
            sampling_rate_hz = options.sampling_rate_hz,
            decode_window_px = options.decode_window_px,
            settle_delay_ms = self.lock.settle_delay().as_millis() as u64,
            "Scanning session started"
        );

        let reason = loop {
            if stop.is_requested() {
                break StopReason::Requested;
            }

            let settle_deadline = self.lock.settle_deadline();
            tokio::select! {
                biased;
                _ = stop.requested() => break StopReason::Requested,
                _ = sleep_until_deadline(settle_deadline) => {
                    self.apply_lock(LockEvent::SettleElapsed);
                }
                event = events.recv() => match event {
                    None => break StopReason::SourceEnded,
                    Some(ScanEvent::DecodeError(message)) => {
                        report.decode_errors += 1;
                        tracing::trace!(%message, "Decode error ignored");
                    }
                    Some(ScanEvent::Decoded(code)) => {
                        if !self.lock.try_acquire(Instant::now()) {
                            report.dropped += 1;
                            tracing::trace!(
                                code = %code,
                                phase = self.lock.phase().name(),
                                "Scan dropped (lock held)"
                            );
                            continue;
                        }
                        self.session.publish_lock_phase(self.lock.phase());
                        report.accepted += 1;
                        tracing::debug!(code = %code, "Scan accepted");

                        if let Some(reason) = self
                            .process_while_draining(code, &mut events, &mut stop, &lifecycle, &mut report)
                            .await
                        {
                            break reason;
                        }
                    }
                }
            }
        };

        lifecycle.deactivate();
        events.close();
        let stop_result = source.stop().await;
        self.reset_lock();
        self.session.end_scan_session();
        report.stop_reason = Some(reason);

        tracing::info!(
            accepted = report.accepted,
            dropped = report.dropped,
            decode_errors = report.decode_errors,
            checked_in = report.checked_in,
            reason = ?reason,
            "Scanning session ended"
        );

        if let Err(err) = stop_result {
            tracing::error!(error = %err, "Scan source failed to stop");
            return Err(CheckinError::ScanSourceStop(err));
        }
        Ok(report)
    }

    /// Drives one accepted scan to completion while discarding everything
    /// the source delivers meanwhile. Returns a stop reason if the session
    /// should end once the scan is done.
    async fn process_while_draining(
        &mut self,
        code: ScanCode,
        events: &mut mpsc::Receiver<ScanEvent>,
        stop: &mut StopSignal,
        lifecycle: &ScanLifecycle,
        report: &mut ScanReport,
    ) -> Option<StopReason> {
        let mut stop_reason = None;
        let mut stop_seen = false;
        let mut source_open = true;

        let work = process_scan(&self.backend, &self.session, &mut self.lock, code, lifecycle);
        tokio::pin!(work);

        let confirmed = loop {
            tokio::select! {
                biased;
                confirmed = &mut work => break confirmed,
                _ = stop.requested(), if !stop_seen => {
                    // Requests in flight run to completion but may no longer
                    // touch the session. Takes precedence over a source end.
                    stop_seen = true;
                    lifecycle.deactivate();
                    stop_reason = Some(StopReason::Requested);
                }
                event = events.recv(), if source_open => match event {
                    None => {
                        source_open = false;
                        stop_reason.get_or_insert(StopReason::SourceEnded);
                    }
                    Some(ScanEvent::Decoded(dropped)) => {
                        report.dropped += 1;
                        tracing::trace!(code = %dropped, "Scan dropped (request in flight)");
                    }
                    Some(ScanEvent::DecodeError(_)) => report.decode_errors += 1,
                },
            }
        };

        if confirmed {
            report.checked_in += 1;
        }
        stop_reason
    }

    fn apply_lock(&mut self, event: LockEvent) {
        let phase = self.lock.apply(event);
        self.session.publish_lock_phase(phase);
    }

    fn reset_lock(&mut self) {
        self.apply_lock(LockEvent::Reset);
    }
}

/// Validate, then check in when eligible. Returns true if the ticket ended
/// up checked in.
async fn process_scan<B: CheckinBackend>(
    backend: &B,
    session: &SessionHandle,
    lock: &mut ScanLock,
    code: ScanCode,
    lifecycle: &ScanLifecycle,
) -> bool {
    let outcome = validation::validate(backend, session, &code, lifecycle).await;
    let eligible = outcome.eligible_ticket().is_some();
    session.publish_lock_phase(lock.apply(LockEvent::Validated { eligible }));
    if !eligible {
        return false;
    }

    if !lifecycle.is_active() {
        session.publish_lock_phase(lock.apply(LockEvent::Dismissed));
        return false;
    }

    session.publish_lock_phase(lock.apply(LockEvent::ConfirmRequested));
    let checkin = checkin::check_in(backend, session, lifecycle).await;
    if checkin.is_confirmed() {
        lock.confirm_checkin(Instant::now());
        session.publish_lock_phase(lock.phase());
        return matches!(checkin, CheckinOutcome::CheckedIn(_));
    }

    session.publish_lock_phase(lock.apply(LockEvent::CheckinFailed));
    false
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
