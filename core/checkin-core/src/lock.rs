//! Scan lock state machine.
//!
//! ```text
//! idle ──scan──▶ validating ──not eligible──▶ idle
//!                    │
//!                 eligible
//!                    ▼
//!        awaiting_confirmation ──dismissed──▶ idle
//!                    │
//!                 confirm
//!                    ▼
//!               checking_in ──failed──▶ idle
//!                    │
//!                confirmed
//!                    ▼
//!           settling{until} ──deadline──▶ idle
//! ```
//!
//! Any phase other than `idle` (or `settling` past its deadline) holds the
//! lock, and scans that arrive then are dropped.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    Idle,
    Validating,
    AwaitingConfirmation,
    CheckingIn,
    Settling { until: Instant },
}

impl LockPhase {
    pub fn name(&self) -> &'static str {
        match self {
            LockPhase::Idle => "idle",
            LockPhase::Validating => "validating",
            LockPhase::AwaitingConfirmation => "awaiting_confirmation",
            LockPhase::CheckingIn => "checking_in",
            LockPhase::Settling { .. } => "settling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEvent {
    ScanAccepted,
    Validated { eligible: bool },
    ConfirmRequested,
    Dismissed,
    CheckinConfirmed { until: Instant },
    CheckinFailed,
    SettleElapsed,
    Reset,
}

/// Pure transition function. Events that make no sense in the current phase
/// leave it unchanged.
pub fn next_phase(current: LockPhase, event: LockEvent) -> LockPhase {
    match (current, event) {
        (_, LockEvent::Reset) => LockPhase::Idle,
        (LockPhase::Idle, LockEvent::ScanAccepted) => LockPhase::Validating,
        (LockPhase::Settling { .. }, LockEvent::ScanAccepted) => LockPhase::Validating,
        (LockPhase::Validating, LockEvent::Validated { eligible: true }) => {
            LockPhase::AwaitingConfirmation
        }
        (LockPhase::Validating, LockEvent::Validated { eligible: false }) => LockPhase::Idle,
        (LockPhase::AwaitingConfirmation, LockEvent::ConfirmRequested) => LockPhase::CheckingIn,
        (LockPhase::AwaitingConfirmation, LockEvent::Dismissed) => LockPhase::Idle,
        (LockPhase::CheckingIn, LockEvent::CheckinConfirmed { until }) => {
            LockPhase::Settling { until }
        }
        (LockPhase::CheckingIn, LockEvent::CheckinFailed) => LockPhase::Idle,
        (LockPhase::Settling { .. }, LockEvent::SettleElapsed) => LockPhase::Idle,
        (phase, _) => phase,
    }
}

/// Mutual-exclusion lock for one scanning session.
#[derive(Debug)]
pub struct ScanLock {
    phase: LockPhase,
    settle_delay: Duration,
}

impl ScanLock {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            phase: LockPhase::Idle,
            settle_delay,
        }
    }

    pub fn phase(&self) -> LockPhase {
        self.phase
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Whether a scan arriving at `now` would be dropped.
    pub fn is_held(&self, now: Instant) -> bool {
        match self.phase {
            LockPhase::Idle => false,
            LockPhase::Settling { until } => now < until,
            _ => true,
        }
    }

    /// Takes the lock for a new scan if it is free at `now`.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_held(now) {
            return false;
        }
        self.apply(LockEvent::ScanAccepted);
        true
    }

    pub fn settle_deadline(&self) -> Option<Instant> {
        match self.phase {
            LockPhase::Settling { until } => Some(until),
            _ => None,
        }
    }

    /// Records a confirmed check-in, holding the lock until `now + settle`.
    pub fn confirm_checkin(&mut self, now: Instant) {
        let until = now + self.settle_delay;
        self.apply(LockEvent::CheckinConfirmed { until });
    }

    pub fn apply(&mut self, event: LockEvent) -> LockPhase {
        let next = next_phase(self.phase, event);
        if next != self.phase {
            tracing::trace!(from = self.phase.name(), to = next.name(), ?event, "Scan lock transition");
        }
        self.phase = next;
        next
    }
}
