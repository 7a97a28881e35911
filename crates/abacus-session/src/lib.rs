//! Abacus Session - Offline-resilient test session orchestration
//!
//! Provides:
//! - Connectivity monitoring with transition-only fan-out
//! - Debounced answer delivery
//! - Bounded-retry synchronization of the durable pending-answer queue
//! - The timed test session controller (countdown, reconciliation,
//!   expiry, submission and reconnect finalization)
//!
//! ## Modules
//!
//! - [`connectivity`] - Online/offline state and subscriber notification
//! - [`debounce`] - Per-question quiet-period queue for answer edits
//! - [`sync`] - Drains queued answers to the server
//! - [`controller`] - Session actor and its handle
//! - [`telemetry`] - `tracing` subscriber setup

pub mod connectivity;
pub mod controller;
pub mod debounce;
pub mod sync;
pub mod telemetry;

use abacus_core::domain::DomainError;
use abacus_core::ports::{RemoteError, StorageError};
use thiserror::Error;

pub use connectivity::{ConnectivityMonitor, Subscription};
pub use controller::{
    ControllerDeps, ControllerHandle, ControllerSettings, SessionAction, SessionView,
    TestSessionController,
};
pub use debounce::DebouncedAnswerQueue;
pub use sync::{AnswerSyncEngine, SyncReport};

/// Errors surfaced by session operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server refused or could not be reached
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The durable store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A state-machine or validation rule was violated
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// No session has been started or resumed
    #[error("No active session")]
    NoActiveSession,

    /// `begin` was called while a session is already running
    #[error("A session is already active for this test")]
    AlreadyStarted,

    /// Queued answers could not all be delivered; submission was held back
    #[error("{0} answer(s) are still waiting to be synced")]
    AnswersPending(usize),

    /// The controller task is no longer running
    #[error("Session controller has stopped")]
    ControllerStopped,
}
