//! Answer sync engine
//!
//! Drains the durable pending-answer queue of a session to the server.
//!
//! ## Per-entry outcome
//!
//! | Server response               | Queue effect                                    |
//! |-------------------------------|-------------------------------------------------|
//! | success / already completed   | entry removed, counted as synced                |
//! | transient failure             | one attempt consumed; dropped at zero           |
//! | credentials refused (401/403) | drain stops; this and later entries kept as is  |
//! | other rejection               | entry dropped immediately                       |
//!
//! Entries are sent one at a time in queue order, and one entry's failure
//! never stops the rest of the drain, except a credentials refusal: every
//! later request would be refused the same way. Two drains of the same
//! engine never overlap.
//!
//! The same policy applies to answers the store refused to queue; those are
//! held by the caller and drained with [`AnswerSyncEngine::sync_unqueued`].

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use abacus_core::domain::{PendingAnswer, SessionId};
use abacus_core::ports::{IExamApi, ISessionStore, RemoteError, StorageError};

// ============================================================================
// SyncReport
// ============================================================================

/// Outcome of one drain of the pending queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Answers the server accepted (or had already recorded)
    pub synced: u32,
    /// Answers still waiting after this drain
    pub retained: u32,
    /// Answers removed without being accepted
    pub dropped: Vec<PendingAnswer>,
    /// The server refused the credentials; the drain stopped early
    pub auth_rejected: bool,
    /// Queue bookkeeping failures (non-fatal)
    pub errors: Vec<String>,
    /// Wall-clock duration of the drain in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// True when nothing is left in the queue after this drain
    pub fn is_drained(&self) -> bool {
        self.retained == 0
    }

    /// Folds `other` into this report
    pub fn merge(&mut self, other: SyncReport) {
        self.synced += other.synced;
        self.retained += other.retained;
        self.dropped.extend(other.dropped);
        self.auth_rejected |= other.auth_rejected;
        self.errors.extend(other.errors);
        self.duration_ms += other.duration_ms;
    }
}

enum Delivery {
    Synced,
    Retained,
    Dropped,
    AuthRejected,
}

// ============================================================================
// AnswerSyncEngine
// ============================================================================

/// Sends queued answers to the server with a bounded retry budget
pub struct AnswerSyncEngine {
    api: Arc<dyn IExamApi>,
    store: Arc<dyn ISessionStore>,
    /// Serializes drains so an entry is never sent twice concurrently
    drain_lock: Mutex<()>,
}

impl AnswerSyncEngine {
    pub fn new(api: Arc<dyn IExamApi>, store: Arc<dyn ISessionStore>) -> Self {
        Self {
            api,
            store,
            drain_lock: Mutex::new(()),
        }
    }

    /// Drains the pending queue of `session_id` once
    ///
    /// Only the initial queue read can fail the call. Failures while updating
    /// individual entries are recorded in [`SyncReport::errors`].
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sync_pending_answers(
        &self,
        session_id: &SessionId,
    ) -> Result<SyncReport, StorageError> {
        let _guard = self.drain_lock.lock().await;
        let start = Instant::now();
        let mut report = SyncReport::default();

        let queue = self.store.pending_answers(session_id).await?;
        if queue.is_empty() {
            debug!(session_id = %session_id, "Pending queue empty, nothing to sync");
            return Ok(report);
        }

        let total = queue.len();
        info!(session_id = %session_id, count = total, "Syncing pending answers");

        for (sent, mut entry) in queue.into_iter().enumerate() {
            match self.deliver(session_id, &mut entry).await {
                Delivery::Synced => {
                    self.remove(session_id, &entry, &mut report).await;
                    report.synced += 1;
                }
                Delivery::Retained => {
                    if let Err(e) = self.store.update_pending_answer(session_id, &entry).await {
                        report
                            .errors
                            .push(format!("update {}: {}", entry.question_id(), e));
                    }
                    report.retained += 1;
                }
                Delivery::Dropped => {
                    self.remove(session_id, &entry, &mut report).await;
                    report.dropped.push(entry);
                }
                Delivery::AuthRejected => {
                    report.auth_rejected = true;
                    report.retained += (total - sent) as u32;
                    break;
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            session_id = %session_id,
            synced = report.synced,
            retained = report.retained,
            dropped = report.dropped.len(),
            auth_rejected = report.auth_rejected,
            duration_ms = report.duration_ms,
            "Pending answer sync finished"
        );
        Ok(report)
    }

    /// Drains answers held in memory because the store would not queue them
    ///
    /// Returns the report and the entries that must be kept for a later
    /// drain, in their original order.
    #[tracing::instrument(level = "debug", skip(self, entries), fields(count = entries.len()))]
    pub async fn sync_unqueued(
        &self,
        session_id: &SessionId,
        entries: Vec<PendingAnswer>,
    ) -> (SyncReport, Vec<PendingAnswer>) {
        let _guard = self.drain_lock.lock().await;
        let start = Instant::now();
        let mut report = SyncReport::default();
        let mut kept = Vec::new();

        let mut entries = entries.into_iter();
        while let Some(mut entry) = entries.next() {
            match self.deliver(session_id, &mut entry).await {
                Delivery::Synced => report.synced += 1,
                Delivery::Retained => kept.push(entry),
                Delivery::Dropped => report.dropped.push(entry),
                Delivery::AuthRejected => {
                    report.auth_rejected = true;
                    kept.push(entry);
                    kept.extend(entries.by_ref());
                }
            }
        }

        report.retained = kept.len() as u32;
        report.duration_ms = start.elapsed().as_millis() as u64;
        (report, kept)
    }

    /// Sends one entry and classifies the response
    async fn deliver(&self, session_id: &SessionId, entry: &mut PendingAnswer) -> Delivery {
        let question_id = *entry.question_id();
        let result = self
            .api
            .submit_answer(session_id, &question_id, entry.answer())
            .await;

        match result {
            Ok(()) | Err(RemoteError::AlreadyCompleted) => {
                debug!(question_id = %question_id, "Pending answer synced");
                Delivery::Synced
            }
            Err(err) if err.is_transient() => {
                if entry.record_failure() {
                    warn!(
                        question_id = %question_id,
                        error = %err,
                        "Pending answer exhausted its attempts, dropping"
                    );
                    Delivery::Dropped
                } else {
                    warn!(
                        question_id = %question_id,
                        attempts_remaining = entry.attempts_remaining().get(),
                        error = %err,
                        "Transient error, answer kept for retry"
                    );
                    Delivery::Retained
                }
            }
            Err(err) if err.is_auth_rejection() => {
                warn!(
                    question_id = %question_id,
                    error = %err,
                    "Credentials refused, keeping queued answers"
                );
                Delivery::AuthRejected
            }
            Err(err) => {
                warn!(
                    question_id = %question_id,
                    error = %err,
                    "Answer rejected by server, dropping"
                );
                Delivery::Dropped
            }
        }
    }

    async fn remove(&self, session_id: &SessionId, entry: &PendingAnswer, report: &mut SyncReport) {
        if let Err(e) = self.store.remove_pending_answer(session_id, entry).await {
            warn!(question_id = %entry.question_id(), error = %e, "Failed to remove pending answer");
            report
                .errors
                .push(format!("remove {}: {}", entry.question_id(), e));
        }
    }
}
