//! Session store port (driven/secondary port)
//!
//! This module defines the durable key-value store that lets a test attempt
//! survive a reload. Everything is namespaced by the session id.
//!
//! ## Design Notes
//!
//! - Errors are reported as [`StorageError`]; callers log them and carry on
//!   with in-memory state, so no variant is fatal.
//! - The pending queue holds at most one entry per question: enqueuing a
//!   newer write supersedes the older one, so stale text is never synced
//!   after newer text.
//! - Setting the expiry flag also sets the submission intent, so the store
//!   cannot hold "expired but nothing to submit".

use crate::domain::{PendingAnswer, SessionId, TestId, TestSession};

/// Failure of the durable store
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Port trait for durable per-session state
#[async_trait::async_trait]
pub trait ISessionStore: Send + Sync {
    // --- Session snapshot ---

    /// Upserts the session snapshot
    async fn save_session_state(&self, session: &TestSession) -> Result<(), StorageError>;

    async fn load_session_state(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<TestSession>, StorageError>;

    /// Finds the most recently updated snapshot for a test
    async fn load_session_for_test(
        &self,
        test_id: &TestId,
    ) -> Result<Option<TestSession>, StorageError>;

    /// Removes snapshot, pending queue and flags in one all-or-nothing step
    async fn clear_session_state(&self, session_id: &SessionId) -> Result<(), StorageError>;

    // --- Pending answer queue ---

    /// Appends an answer, superseding any queued write for the same question
    async fn enqueue_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError>;

    /// Returns the queue in FIFO order without removing anything
    async fn pending_answers(&self, session_id: &SessionId)
        -> Result<Vec<PendingAnswer>, StorageError>;

    /// Removes `answer` if it is still the queued write for its question
    ///
    /// A later write for the same question survives. Removing an entry that
    /// is already gone is a no-op.
    async fn remove_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError>;

    /// Persists the attempts counter of `answer` if it is still queued
    async fn update_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError>;

    // --- Durable intent flags ---

    async fn set_submission_intent(&self, session_id: &SessionId) -> Result<(), StorageError>;

    /// Clears both the submission intent and the expiry flag
    async fn clear_submission_intent(&self, session_id: &SessionId) -> Result<(), StorageError>;

    async fn has_submission_intent(&self, session_id: &SessionId) -> Result<bool, StorageError>;

    /// Marks the session as expired offline (also sets submission intent)
    async fn set_expiry_flag(&self, session_id: &SessionId) -> Result<(), StorageError>;

    async fn has_expiry_flag(&self, session_id: &SessionId) -> Result<bool, StorageError>;
}
