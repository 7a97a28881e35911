//! Exam API port (driven/secondary port)
//!
//! This module defines the interface to the remote test-taking API. The
//! primary implementation is the HTTP client in `abacus-api`.
//!
//! ## Design Notes
//!
//! - Unlike the other ports this one returns a typed [`RemoteError`]: the
//!   sync engine and the session controller must tell a transient failure
//!   (retry later, fall back to offline) from a rejection (surface, do not
//!   retry) and from "already completed" (treat as success).
//! - Uses `#[async_trait]` for async trait methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QuestionId, SessionId, TestDefinition, TestId};

// ============================================================================
// RemoteError
// ============================================================================

/// Classified failure of a remote call
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network-level failure: DNS, connection refused, timeout
    #[error("Remote API unreachable: {0}")]
    Unreachable(String),

    /// Request rejected by the server (4xx other than 409/429)
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server reports the attempt (or answer) as already completed
    #[error("Already completed on the server")]
    AlreadyCompleted,

    /// Rate limited; retry after the given number of seconds
    #[error("Throttled, retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    /// 5xx response
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// True if retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Unreachable(_) | RemoteError::Throttled { .. } | RemoteError::Server { .. }
        )
    }

    /// True if the credentials were refused (401/403); the student must sign in again
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, RemoteError::Rejected { status: 401 | 403, .. })
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// Session status as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteSessionStatus {
    Pending,
    InProgress,
    Completed,
    Expired,
    /// Any status this client does not know about
    Other(String),
}

impl RemoteSessionStatus {
    /// Parses the server's status string (case-insensitive)
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" | "NOT_STARTED" => RemoteSessionStatus::Pending,
            "IN_PROGRESS" => RemoteSessionStatus::InProgress,
            "COMPLETED" | "SUBMITTED" => RemoteSessionStatus::Completed,
            "EXPIRED" => RemoteSessionStatus::Expired,
            _ => RemoteSessionStatus::Other(raw.to_string()),
        }
    }

    /// True if the server considers the attempt finished
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteSessionStatus::Completed | RemoteSessionStatus::Expired
        )
    }
}

/// Authoritative remaining time of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemainingDuration {
    pub status: RemoteSessionStatus,
    pub remaining_seconds: u32,
}

/// An answer already recorded on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAnswer {
    pub question_id: QuestionId,
    pub answer_text: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

// ============================================================================
// IExamApi trait
// ============================================================================

/// Port trait for the remote exam API
#[async_trait::async_trait]
pub trait IExamApi: Send + Sync {
    /// Fetches the immutable definition of a test
    async fn fetch_test(&self, test_id: &TestId) -> Result<TestDefinition, RemoteError>;

    /// Creates a student-test pairing and returns its session id
    async fn create_session(&self, test_id: &TestId) -> Result<SessionId, RemoteError>;

    /// Starts the server-side countdown
    async fn begin_session(&self, session_id: &SessionId) -> Result<(), RemoteError>;

    /// Reads the authoritative remaining time and status
    async fn remaining_duration(
        &self,
        session_id: &SessionId,
    ) -> Result<RemainingDuration, RemoteError>;

    /// Records (or overwrites) the answer to one question
    async fn submit_answer(
        &self,
        session_id: &SessionId,
        question_id: &QuestionId,
        answer_text: &str,
    ) -> Result<(), RemoteError>;

    /// Lists answers the server has recorded for the session
    async fn list_answers(&self, session_id: &SessionId) -> Result<Vec<RemoteAnswer>, RemoteError>;

    /// Submits the attempt for grading
    ///
    /// A server response meaning "already submitted" is reported as
    /// [`RemoteError::AlreadyCompleted`]; callers treat it as success.
    async fn submit_session(&self, session_id: &SessionId) -> Result<(), RemoteError>;
}

/// Port trait for a cheap "can we reach the API" probe
#[async_trait::async_trait]
pub trait IReachability: Send + Sync {
    async fn is_reachable(&self) -> bool;
}
