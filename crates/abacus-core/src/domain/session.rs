//! TestSession domain entity
//!
//! This module defines the [`TestSession`] entity, the single typed record
//! describing one student's attempt at a test, and the [`SessionStatus`]
//! state machine that governs it.
//!
//! ## State Machine
//!
//! ```text
//! NOT_STARTED ──start()──► IN_PROGRESS ──tick() reaches 0──► EXPIRED ─────┐
//!                               │                                          │
//!                               └──request_submission()──► PENDING_SUBMISSION
//!                                                                          │
//!                                       mark_submitted() ◄─────────────────┘
//!                                              │
//!                                              ▼
//!                                          SUBMITTED
//! ```
//!
//! The snapshot is persisted as one unit, so the status and the countdown
//! can never disagree after a reload.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{QuestionId, SessionId, TestId};
use super::test_definition::TestDefinition;

/// Status of a test session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Created remotely but the countdown has not begun
    NotStarted,
    /// Countdown running, answers accepted
    InProgress,
    /// Student asked to submit; waiting for the remote submit to succeed
    PendingSubmission,
    /// Countdown reached zero; waiting for the remote submit to succeed
    Expired,
    /// Remote submission confirmed (terminal)
    Submitted,
}

impl SessionStatus {
    /// Returns true while the student may still edit answers
    pub fn accepts_answers(&self) -> bool {
        matches!(self, SessionStatus::InProgress)
    }

    /// Returns true if a remote submission is owed
    pub fn is_awaiting_submission(&self) -> bool {
        matches!(
            self,
            SessionStatus::PendingSubmission | SessionStatus::Expired
        )
    }

    /// Returns true if the session can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Submitted)
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::NotStarted
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::NotStarted => "NOT_STARTED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::PendingSubmission => "PENDING_SUBMISSION",
            SessionStatus::Expired => "EXPIRED",
            SessionStatus::Submitted => "SUBMITTED",
        };
        write!(f, "{}", s)
    }
}

/// Result of advancing the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown still running with this many seconds left
    Running { remaining_seconds: u32 },
    /// Countdown reached zero on this call; the session is now EXPIRED.
    /// Returned at most once per session.
    Elapsed,
    /// Session is not IN_PROGRESS; nothing changed
    Stopped,
}

/// One student's attempt at a test
///
/// Field names in the serialized form follow the persisted snapshot layout
/// (`student_test_uuid`, `remaining_time`, `section_pages`, `test_data`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSession {
    #[serde(rename = "student_test_uuid")]
    id: SessionId,
    #[serde(rename = "test_uuid")]
    test_id: TestId,
    status: SessionStatus,
    #[serde(rename = "remaining_time")]
    remaining_seconds: u32,
    current_section: usize,
    #[serde(default)]
    section_pages: BTreeMap<usize, u32>,
    #[serde(default)]
    answers: BTreeMap<QuestionId, String>,
    #[serde(rename = "test_data", default, skip_serializing_if = "Option::is_none")]
    test: Option<TestDefinition>,
    updated_at: DateTime<Utc>,
}

impl TestSession {
    /// Creates a NOT_STARTED session for a freshly created remote session
    pub fn new(id: SessionId, test_id: TestId) -> Self {
        Self {
            id,
            test_id,
            status: SessionStatus::NotStarted,
            remaining_seconds: 0,
            current_section: 0,
            section_pages: BTreeMap::new(),
            answers: BTreeMap::new(),
            test: None,
            updated_at: Utc::now(),
        }
    }

    /// NOT_STARTED → IN_PROGRESS
    ///
    /// Starts the countdown at the test's full duration and keeps a copy of
    /// the definition for offline continuation.
    pub fn start(&mut self, test: TestDefinition) -> Result<(), DomainError> {
        if self.status != SessionStatus::NotStarted {
            return Err(self.invalid_transition(SessionStatus::InProgress));
        }
        self.remaining_seconds = test.duration_seconds();
        self.test = Some(test);
        self.status = SessionStatus::InProgress;
        self.touch();
        Ok(())
    }

    // --- Getters ---

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn current_section(&self) -> usize {
        self.current_section
    }

    /// Current page of a section (0 if never paginated)
    pub fn current_page(&self, section: usize) -> u32 {
        self.section_pages.get(&section).copied().unwrap_or(0)
    }

    pub fn section_pages(&self) -> &BTreeMap<usize, u32> {
        &self.section_pages
    }

    pub fn answers(&self) -> &BTreeMap<QuestionId, String> {
        &self.answers
    }

    pub fn answer(&self, question_id: &QuestionId) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    /// Cached test definition, present once the session has started
    pub fn test(&self) -> Option<&TestDefinition> {
        self.test.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // --- Countdown ---

    /// Advances the countdown by one second
    ///
    /// Reaching zero moves the session to EXPIRED in the same call, so
    /// [`TickOutcome::Elapsed`] is observed exactly once.
    pub fn tick(&mut self) -> TickOutcome {
        if self.status != SessionStatus::InProgress {
            return TickOutcome::Stopped;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        self.settle_countdown()
    }

    /// Applies the authoritative remaining time reported by the server
    ///
    /// The countdown never moves up while IN_PROGRESS: the smaller of the
    /// local and remote values wins.
    pub fn apply_remote_remaining(&mut self, remote_seconds: u32) -> TickOutcome {
        if self.status != SessionStatus::InProgress {
            return TickOutcome::Stopped;
        }
        self.remaining_seconds = self.remaining_seconds.min(remote_seconds);
        self.settle_countdown()
    }

    fn settle_countdown(&mut self) -> TickOutcome {
        self.touch();
        if self.remaining_seconds == 0 {
            self.status = SessionStatus::Expired;
            TickOutcome::Elapsed
        } else {
            TickOutcome::Running {
                remaining_seconds: self.remaining_seconds,
            }
        }
    }

    // --- Answers ---

    /// Records an answer, returning the previous text for that question
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        text: impl Into<String>,
    ) -> Result<Option<String>, DomainError> {
        if !self.status.accepts_answers() {
            return Err(DomainError::InvalidState {
                from: self.status.to_string(),
                to: "answer".to_string(),
            });
        }
        if let Some(test) = &self.test {
            if test.find_question(&question_id).is_none() {
                return Err(DomainError::UnknownQuestion(question_id.to_string()));
            }
        }
        let previous = self.answers.insert(question_id, text.into());
        self.touch();
        Ok(previous)
    }

    /// Restores an answer from the durable pending queue without any status check
    pub fn restore_answer(&mut self, question_id: QuestionId, text: impl Into<String>) {
        self.answers.insert(question_id, text.into());
    }

    // --- Pagination ---

    pub fn select_section(&mut self, index: usize) -> Result<(), DomainError> {
        self.ensure_navigable()?;
        if let Some(test) = &self.test {
            if index >= test.sections().len() {
                return Err(DomainError::SectionOutOfRange {
                    index,
                    count: test.sections().len(),
                });
            }
        }
        self.current_section = index;
        self.touch();
        Ok(())
    }

    /// Sets the page of `section`, validated against `per_page` questions per page
    pub fn set_page(&mut self, section: usize, page: u32, per_page: u32) -> Result<(), DomainError> {
        self.ensure_navigable()?;
        if let Some(test) = &self.test {
            let sec = test.section(section).ok_or(DomainError::SectionOutOfRange {
                index: section,
                count: test.sections().len(),
            })?;
            let pages = sec.page_count(per_page);
            if page >= pages {
                return Err(DomainError::PageOutOfRange {
                    section,
                    page,
                    pages,
                });
            }
        }
        self.section_pages.insert(section, page);
        self.touch();
        Ok(())
    }

    fn ensure_navigable(&self) -> Result<(), DomainError> {
        match self.status {
            SessionStatus::NotStarted | SessionStatus::Submitted => {
                Err(DomainError::InvalidState {
                    from: self.status.to_string(),
                    to: "paginate".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    // --- Submission ---

    /// IN_PROGRESS → PENDING_SUBMISSION (idempotent once pending)
    pub fn request_submission(&mut self) -> Result<(), DomainError> {
        match self.status {
            SessionStatus::InProgress => {
                self.status = SessionStatus::PendingSubmission;
                self.touch();
                Ok(())
            }
            SessionStatus::PendingSubmission | SessionStatus::Expired => Ok(()),
            other => Err(self.invalid_transition_from(other, SessionStatus::PendingSubmission)),
        }
    }

    /// Forces the EXPIRED state (idempotent)
    ///
    /// A session already waiting on a user-requested submission keeps that
    /// status, since a submission is owed either way.
    pub fn expire(&mut self) -> Result<(), DomainError> {
        match self.status {
            SessionStatus::InProgress => {
                self.remaining_seconds = 0;
                self.status = SessionStatus::Expired;
                self.touch();
                Ok(())
            }
            SessionStatus::Expired | SessionStatus::PendingSubmission => Ok(()),
            other => Err(self.invalid_transition_from(other, SessionStatus::Expired)),
        }
    }

    /// Any started state → SUBMITTED (idempotent)
    pub fn mark_submitted(&mut self) -> Result<(), DomainError> {
        match self.status {
            SessionStatus::NotStarted => {
                Err(self.invalid_transition(SessionStatus::Submitted))
            }
            SessionStatus::Submitted => Ok(()),
            _ => {
                self.status = SessionStatus::Submitted;
                self.touch();
                Ok(())
            }
        }
    }

    /// Folds durable intent markers back into the typed status after a reload
    pub fn apply_durable_flags(&mut self, submission_intent: bool, expired: bool) {
        if self.status.is_terminal() || self.status == SessionStatus::NotStarted {
            return;
        }
        if expired && self.status == SessionStatus::InProgress {
            self.remaining_seconds = 0;
            self.status = SessionStatus::Expired;
        } else if submission_intent && self.status == SessionStatus::InProgress {
            self.status = SessionStatus::PendingSubmission;
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn invalid_transition(&self, to: SessionStatus) -> DomainError {
        self.invalid_transition_from(self.status, to)
    }

    fn invalid_transition_from(&self, from: SessionStatus, to: SessionStatus) -> DomainError {
        DomainError::InvalidState {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
