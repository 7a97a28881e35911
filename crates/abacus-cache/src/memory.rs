//! In-memory implementation of ISessionStore
//!
//! Mirrors the SQLite store's semantics without touching disk. Used by
//! tests (including ones that run on a paused tokio clock) and as the
//! fallback when the data directory is not writable.

use dashmap::DashMap;

use abacus_core::domain::{PendingAnswer, SessionId, TestId, TestSession};
use abacus_core::ports::{ISessionStore, StorageError};

#[derive(Debug, Default, Clone)]
struct SessionRecord {
    snapshot: Option<TestSession>,
    pending: Vec<PendingAnswer>,
    submission_intent: bool,
    expired: bool,
}

impl SessionRecord {
    fn is_empty(&self) -> bool {
        self.snapshot.is_none() && self.pending.is_empty() && !self.submission_intent
    }
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with any stored state
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait::async_trait]
impl ISessionStore for InMemorySessionStore {
    async fn save_session_state(&self, session: &TestSession) -> Result<(), StorageError> {
        self.sessions
            .entry(*session.id())
            .or_default()
            .snapshot = Some(session.clone());
        Ok(())
    }

    async fn load_session_state(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<TestSession>, StorageError> {
        Ok(self
            .sessions
            .get(session_id)
            .and_then(|r| r.snapshot.clone()))
    }

    async fn load_session_for_test(
        &self,
        test_id: &TestId,
    ) -> Result<Option<TestSession>, StorageError> {
        Ok(self
            .sessions
            .iter()
            .filter_map(|r| r.snapshot.clone())
            .filter(|s| s.test_id() == test_id)
            .max_by_key(|s| s.updated_at()))
    }

    async fn clear_session_state(&self, session_id: &SessionId) -> Result<(), StorageError> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn enqueue_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError> {
        let mut record = self.sessions.entry(*session_id).or_default();
        record
            .pending
            .retain(|p| p.question_id() != answer.question_id());
        record.pending.push(answer.clone());
        Ok(())
    }

    async fn pending_answers(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<PendingAnswer>, StorageError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|r| r.pending.clone())
            .unwrap_or_default())
    }

    async fn remove_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError> {
        if let Some(mut record) = self.sessions.get_mut(session_id) {
            record.pending.retain(|p| !p.is_same_entry(answer));
        }
        self.sessions.remove_if(session_id, |_, r| r.is_empty());
        Ok(())
    }

    async fn update_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError> {
        if let Some(mut record) = self.sessions.get_mut(session_id) {
            if let Some(entry) = record.pending.iter_mut().find(|p| p.is_same_entry(answer)) {
                *entry = answer.clone();
            }
        }
        Ok(())
    }

    async fn set_submission_intent(&self, session_id: &SessionId) -> Result<(), StorageError> {
        self.sessions
            .entry(*session_id)
            .or_default()
            .submission_intent = true;
        Ok(())
    }

    async fn clear_submission_intent(&self, session_id: &SessionId) -> Result<(), StorageError> {
        if let Some(mut record) = self.sessions.get_mut(session_id) {
            record.submission_intent = false;
            record.expired = false;
        }
        Ok(())
    }

    async fn has_submission_intent(&self, session_id: &SessionId) -> Result<bool, StorageError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|r| r.submission_intent)
            .unwrap_or(false))
    }

    async fn set_expiry_flag(&self, session_id: &SessionId) -> Result<(), StorageError> {
        let mut record = self.sessions.entry(*session_id).or_default();
        record.submission_intent = true;
        record.expired = true;
        Ok(())
    }

    async fn has_expiry_flag(&self, session_id: &SessionId) -> Result<bool, StorageError> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|r| r.expired)
            .unwrap_or(false))
    }
}
