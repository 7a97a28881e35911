//! SQLite implementation of ISessionStore
//!
//! ## Type Mapping
//!
//! | Domain Type        | SQL Type | Strategy                                        |
//! |--------------------|----------|-------------------------------------------------|
//! | SessionId, TestId  | TEXT     | UUID string via `.to_string()` / `FromStr`      |
//! | QuestionId         | TEXT     | UUID string via `.to_string()` / `FromStr`      |
//! | TestSession        | TEXT     | serde_json snapshot, written as one unit        |
//! | DateTime<Utc>      | TEXT     | RFC 3339 with nanoseconds and `Z`, so values round-trip exactly and sort lexically |
//! | AttemptsRemaining  | INTEGER  | `u8` widened to `i64`                           |
//! | flags              | INTEGER  | 0 / 1                                           |

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use abacus_core::domain::{
    AttemptsRemaining, PendingAnswer, QuestionId, SessionId, TestId, TestSession,
};
use abacus_core::ports::{ISessionStore, StorageError};

use crate::CacheError;

/// SQLite-based implementation of the session store port
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Creates a new store over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn timestamp_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::SerializationError(format!("Invalid timestamp '{}': {}", s, e)))
}

fn snapshot_from_json(json: &str) -> Result<TestSession, CacheError> {
    serde_json::from_str(json)
        .map_err(|e| CacheError::SerializationError(format!("Invalid session snapshot: {}", e)))
}

fn row_to_pending_answer(row: &SqliteRow) -> Result<PendingAnswer, CacheError> {
    let question_id: String = row.try_get("question_id")?;
    let answer: String = row.try_get("answer")?;
    let queued_at: String = row.try_get("queued_at")?;
    let attempts: i64 = row.try_get("attempts_remaining")?;

    let question_id = QuestionId::from_str(&question_id)
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;
    let attempts = u8::try_from(attempts).map_err(|_| {
        CacheError::SerializationError(format!("attempts_remaining out of range: {}", attempts))
    })?;

    Ok(PendingAnswer::with_timestamp(
        question_id,
        answer,
        parse_timestamp(&queued_at)?,
        AttemptsRemaining::new(attempts),
    ))
}

// ============================================================================
// Queries
// ============================================================================

impl SqliteSessionStore {
    async fn save_snapshot(&self, session: &TestSession) -> Result<(), CacheError> {
        let snapshot = serde_json::to_string(session).map_err(|e| {
            CacheError::SerializationError(format!("Failed to serialize session: {}", e))
        })?;

        sqlx::query(
            "INSERT INTO session_snapshots (session_id, test_id, snapshot, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(session_id) DO UPDATE SET \
               test_id = excluded.test_id, \
               snapshot = excluded.snapshot, \
               updated_at = excluded.updated_at",
        )
        .bind(session.id().to_string())
        .bind(session.test_id().to_string())
        .bind(&snapshot)
        .bind(timestamp_to_string(&session.updated_at()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(
            session_id = %session.id(),
            status = %session.status(),
            remaining = session.remaining_seconds(),
            "Saved session snapshot"
        );
        Ok(())
    }

    async fn load_snapshot(&self, session_id: &SessionId) -> Result<Option<TestSession>, CacheError> {
        let snapshot: Option<String> =
            sqlx::query_scalar("SELECT snapshot FROM session_snapshots WHERE session_id = ?")
                .bind(session_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        snapshot.as_deref().map(snapshot_from_json).transpose()
    }

    async fn load_snapshot_for_test(&self, test_id: &TestId) -> Result<Option<TestSession>, CacheError> {
        let snapshot: Option<String> = sqlx::query_scalar(
            "SELECT snapshot FROM session_snapshots WHERE test_id = ? \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(test_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        snapshot.as_deref().map(snapshot_from_json).transpose()
    }

    async fn clear_all(&self, session_id: &SessionId) -> Result<(), CacheError> {
        let id = session_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM pending_answers WHERE session_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM session_flags WHERE session_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM session_snapshots WHERE session_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(session_id = %session_id, "Cleared session state");
        Ok(())
    }

    async fn enqueue(&self, session_id: &SessionId, answer: &PendingAnswer) -> Result<(), CacheError> {
        let id = session_id.to_string();
        let question_id = answer.question_id().to_string();
        let mut tx = self.pool.begin().await?;

        // The row id decides FIFO order, so a superseding write moves to the back.
        sqlx::query("DELETE FROM pending_answers WHERE session_id = ? AND question_id = ?")
            .bind(&id)
            .bind(&question_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO pending_answers \
             (session_id, question_id, answer, queued_at, attempts_remaining) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&question_id)
        .bind(answer.answer())
        .bind(timestamp_to_string(&answer.queued_at()))
        .bind(i64::from(answer.attempts_remaining().get()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::trace!(session_id = %session_id, question_id = %question_id, "Queued pending answer");
        Ok(())
    }

    async fn list_pending(&self, session_id: &SessionId) -> Result<Vec<PendingAnswer>, CacheError> {
        let rows = sqlx::query(
            "SELECT question_id, answer, queued_at, attempts_remaining \
             FROM pending_answers WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_pending_answer).collect()
    }

    async fn remove_pending(&self, session_id: &SessionId, answer: &PendingAnswer) -> Result<(), CacheError> {
        let result = sqlx::query(
            "DELETE FROM pending_answers \
             WHERE session_id = ? AND question_id = ? AND queued_at = ? AND answer = ?",
        )
        .bind(session_id.to_string())
        .bind(answer.question_id().to_string())
        .bind(timestamp_to_string(&answer.queued_at()))
        .bind(answer.answer())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::trace!(
                session_id = %session_id,
                question_id = %answer.question_id(),
                "Pending answer already removed or superseded"
            );
        }
        Ok(())
    }

    async fn update_pending(&self, session_id: &SessionId, answer: &PendingAnswer) -> Result<(), CacheError> {
        sqlx::query(
            "UPDATE pending_answers SET attempts_remaining = ? \
             WHERE session_id = ? AND question_id = ? AND queued_at = ? AND answer = ?",
        )
        .bind(i64::from(answer.attempts_remaining().get()))
        .bind(session_id.to_string())
        .bind(answer.question_id().to_string())
        .bind(timestamp_to_string(&answer.queued_at()))
        .bind(answer.answer())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_flags(&self, session_id: &SessionId, expired: bool) -> Result<(), CacheError> {
        let sql = if expired {
            "INSERT INTO session_flags (session_id, submission_intent, expired) VALUES (?, 1, 1) \
             ON CONFLICT(session_id) DO UPDATE SET submission_intent = 1, expired = 1"
        } else {
            "INSERT INTO session_flags (session_id, submission_intent, expired) VALUES (?, 1, 0) \
             ON CONFLICT(session_id) DO UPDATE SET submission_intent = 1"
        };
        sqlx::query(sql)
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;

        tracing::debug!(session_id = %session_id, expired, "Stored submission intent");
        Ok(())
    }

    async fn delete_flags(&self, session_id: &SessionId) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM session_flags WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn read_flag(&self, session_id: &SessionId, column: Flag) -> Result<bool, CacheError> {
        let sql = match column {
            Flag::SubmissionIntent => {
                "SELECT submission_intent FROM session_flags WHERE session_id = ?"
            }
            Flag::Expired => "SELECT expired FROM session_flags WHERE session_id = ?",
        };
        let value: Option<i64> = sqlx::query_scalar(sql)
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or(0) != 0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Flag {
    SubmissionIntent,
    Expired,
}

// ============================================================================
// ISessionStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ISessionStore for SqliteSessionStore {
    async fn save_session_state(&self, session: &TestSession) -> Result<(), StorageError> {
        Ok(self.save_snapshot(session).await?)
    }

    async fn load_session_state(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<TestSession>, StorageError> {
        Ok(self.load_snapshot(session_id).await?)
    }

    async fn load_session_for_test(
        &self,
        test_id: &TestId,
    ) -> Result<Option<TestSession>, StorageError> {
        Ok(self.load_snapshot_for_test(test_id).await?)
    }

    async fn clear_session_state(&self, session_id: &SessionId) -> Result<(), StorageError> {
        Ok(self.clear_all(session_id).await?)
    }

    async fn enqueue_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError> {
        Ok(self.enqueue(session_id, answer).await?)
    }

    async fn pending_answers(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<PendingAnswer>, StorageError> {
        Ok(self.list_pending(session_id).await?)
    }

    async fn remove_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError> {
        Ok(self.remove_pending(session_id, answer).await?)
    }

    async fn update_pending_answer(
        &self,
        session_id: &SessionId,
        answer: &PendingAnswer,
    ) -> Result<(), StorageError> {
        Ok(self.update_pending(session_id, answer).await?)
    }

    async fn set_submission_intent(&self, session_id: &SessionId) -> Result<(), StorageError> {
        Ok(self.write_flags(session_id, false).await?)
    }

    async fn clear_submission_intent(&self, session_id: &SessionId) -> Result<(), StorageError> {
        Ok(self.delete_flags(session_id).await?)
    }

    async fn has_submission_intent(&self, session_id: &SessionId) -> Result<bool, StorageError> {
        Ok(self.read_flag(session_id, Flag::SubmissionIntent).await?)
    }

    async fn set_expiry_flag(&self, session_id: &SessionId) -> Result<(), StorageError> {
        Ok(self.write_flags(session_id, true).await?)
    }

    async fn has_expiry_flag(&self, session_id: &SessionId) -> Result<bool, StorageError> {
        Ok(self.read_flag(session_id, Flag::Expired).await?)
    }
}
