//! Per-question debounce for answer edits
//!
//! A student typing "1", "12", "124" into the same field should produce one
//! network write, not three. [`DebouncedAnswerQueue`] keeps only the latest
//! text per question and releases it once the question has been quiet for the
//! debounce delay. Each question has its own window.
//!
//! Timestamps use `tokio::time::Instant` so paused-clock tests can drive the
//! window deterministically.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use abacus_core::domain::QuestionId;

/// Collects answer edits and emits the final text once a question settles
#[derive(Debug)]
pub struct DebouncedAnswerQueue {
    /// Latest text per question with the time of the last edit
    pending: HashMap<QuestionId, (String, Instant)>,
    /// Quiet period before an edit is considered settled
    debounce_delay: Duration,
}

impl DebouncedAnswerQueue {
    pub fn new(debounce_delay: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            debounce_delay,
        }
    }

    /// Inserts or replaces the pending text for a question
    ///
    /// The question's window restarts, so continuous typing keeps extending
    /// it until the edits stop.
    pub fn push(&mut self, question_id: QuestionId, text: impl Into<String>) {
        debug!(question_id = %question_id, "Answer edit debounced");
        self.pending
            .insert(question_id, (text.into(), Instant::now()));
    }

    /// Removes and returns every answer whose window has elapsed, oldest edit first
    pub fn poll(&mut self) -> Vec<(QuestionId, String)> {
        let now = Instant::now();
        let mut settled: Vec<(QuestionId, Instant)> = self
            .pending
            .iter()
            .filter(|(_, (_, at))| now.duration_since(*at) >= self.debounce_delay)
            .map(|(id, (_, at))| (*id, *at))
            .collect();
        settled.sort_by_key(|(_, at)| *at);

        let answers: Vec<(QuestionId, String)> = settled
            .into_iter()
            .filter_map(|(id, _)| self.pending.remove(&id).map(|(text, _)| (id, text)))
            .collect();

        if !answers.is_empty() {
            debug!(count = answers.len(), "Polled settled answers");
        }
        answers
    }

    /// Removes and returns everything, settled or not, oldest edit first
    ///
    /// Used when the session is about to be submitted and no edit may be lost.
    pub fn drain_all(&mut self) -> Vec<(QuestionId, String)> {
        let mut all: Vec<(QuestionId, String, Instant)> = self
            .pending
            .drain()
            .map(|(id, (text, at))| (id, text, at))
            .collect();
        all.sort_by_key(|(_, _, at)| *at);
        all.into_iter().map(|(id, text, _)| (id, text)).collect()
    }

    /// Discards every pending edit
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
