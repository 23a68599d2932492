//! # checkin-core
//!
//! Check-in coordination shared by every operator surface of a scan station
//! (continuous scanner, manual lookup, ticket review).
//!
//! ## Design Principles
//!
//! - **One scan at a time**: [`ScanCoordinator`] holds a [`ScanLock`] and drops
//!   scans that arrive while a request is in flight or the last check-in is
//!   settling.
//! - **Single source of truth**: every surface reads the same
//!   [`SessionHandle`]; nothing caches validation results on its own.
//! - **Failures become feedback**: unknown or rejected tickets and backend
//!   trouble are reported through [`Feedback`], never returned as errors.
//! - **Injected timing**: debounce, settle and timeout durations come from
//!   [`TimingConfig`].
//! - **Single task**: request futures run on the coordinator's task and need
//!   not be `Send`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkin_core::{load_config, stop_channel, ScanCoordinator, SessionHandle};
//!
//! let config = load_config(None)?;
//! let session = SessionHandle::new(sink, &config.timing);
//! let mut coordinator = ScanCoordinator::new(backend, session.clone(), &config);
//! let (stop, signal) = stop_channel();
//! let report = coordinator.run(&mut source, signal).await?;
//! ```

pub mod backend;
pub mod checkin;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feedback;
pub mod lock;
pub mod session;
pub mod source;
pub mod types;
pub mod validation;

pub use backend::{BackendError, CheckinBackend};
pub use checkin::{checked_in_message, CheckinOutcome, MSG_CHECKIN_FAILED};
pub use config::*;
pub use coordinator::{ScanCoordinator, ScanReport, StopReason};
pub use error::{CheckinError, Result};
pub use feedback::{Feedback, FeedbackKind, FeedbackSink, ToastDebouncer};
pub use lock::{LockEvent, LockPhase, ScanLock};
pub use session::{SessionHandle, SessionSnapshot};
pub use source::{
    scan_channel, stop_channel, Facing, ScanEvent, ScanLifecycle, ScanOptions, ScanSink,
    ScanSource, ScanSourceError, StopHandle, StopSignal,
};
pub use types::*;
pub use validation::{already_checked_in_message, rejection_message, ValidationOutcome};
