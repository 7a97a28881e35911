//! Pending answer queue entries
//!
//! A [`PendingAnswer`] is an answer the student typed that has not yet been
//! acknowledged by the server. Entries live in the durable store until the
//! sync engine either delivers them or runs out of attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::QuestionId;

/// Number of transient failures an entry may absorb before it is dropped
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Remaining delivery attempts for a pending answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptsRemaining(u8);

impl AttemptsRemaining {
    pub const fn new(max: u8) -> Self {
        Self(max)
    }

    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Consumes one attempt, returning the decremented counter
    #[must_use]
    pub const fn consume(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    pub const fn is_exhausted(&self) -> bool {
        self.0 == 0
    }
}

impl Default for AttemptsRemaining {
    fn default() -> Self {
        Self(DEFAULT_MAX_ATTEMPTS)
    }
}

/// An answer awaiting delivery to the server
///
/// Identity within the queue is the triple (question, timestamp, text): the
/// same question may be queued more than once, and removal only drops the
/// entry that was actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAnswer {
    #[serde(rename = "questionUuid")]
    question_id: QuestionId,
    answer: String,
    #[serde(rename = "timestamp")]
    queued_at: DateTime<Utc>,
    attempts_remaining: AttemptsRemaining,
}

impl PendingAnswer {
    /// Creates an entry stamped with the current time
    pub fn new(question_id: QuestionId, answer: impl Into<String>, max_attempts: u8) -> Self {
        Self::with_timestamp(question_id, answer, Utc::now(), AttemptsRemaining::new(max_attempts))
    }

    /// Rebuilds an entry from stored parts
    pub fn with_timestamp(
        question_id: QuestionId,
        answer: impl Into<String>,
        queued_at: DateTime<Utc>,
        attempts_remaining: AttemptsRemaining,
    ) -> Self {
        Self {
            question_id,
            answer: answer.into(),
            queued_at,
            attempts_remaining,
        }
    }

    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn queued_at(&self) -> DateTime<Utc> {
        self.queued_at
    }

    pub fn attempts_remaining(&self) -> AttemptsRemaining {
        self.attempts_remaining
    }

    /// Records a failed delivery; returns true once no attempts are left
    pub fn record_failure(&mut self) -> bool {
        self.attempts_remaining = self.attempts_remaining.consume();
        self.attempts_remaining.is_exhausted()
    }

    /// True if `other` is the same queued write (question, timestamp and text)
    pub fn is_same_entry(&self, other: &PendingAnswer) -> bool {
        self.question_id == other.question_id
            && self.queued_at == other.queued_at
            && self.answer == other.answer
    }
}
