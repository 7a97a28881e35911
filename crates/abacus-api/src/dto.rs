//! Wire types for the REST API
//!
//! Response bodies are parsed into these private-ish DTOs and then mapped to
//! domain types, so a server-side rename only touches this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use abacus_core::domain::{
    Operation, Question, QuestionId, Section, SectionKind, SessionId, TestDefinition, TestId,
};
use abacus_core::ports::{RemainingDuration, RemoteAnswer, RemoteSessionStatus};

use crate::ApiError;

// ============================================================================
// Test definition
// ============================================================================

/// Response from `GET /tests/{id}`
#[derive(Debug, Deserialize)]
pub struct TestResponse {
    #[serde(alias = "id")]
    pub uuid: TestId,
    #[serde(alias = "name")]
    pub title: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub sections: Vec<SectionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct SectionResponse {
    #[serde(alias = "id")]
    pub uuid: String,
    #[serde(alias = "kind")]
    pub section_type: SectionKind,
    #[serde(default)]
    pub questions: Vec<QuestionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionResponse {
    #[serde(alias = "id")]
    pub uuid: QuestionId,
    #[serde(alias = "position")]
    pub order: u32,
    pub operands: Operands,
    pub operation: Operation,
}

/// Operands arrive either as a JSON array or as a JSON-encoded string of one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Operands {
    List(Vec<i64>),
    Encoded(String),
}

impl Operands {
    pub fn into_vec(self) -> Result<Vec<i64>, ApiError> {
        match self {
            Operands::List(values) => Ok(values),
            Operands::Encoded(raw) => serde_json::from_str(&raw).map_err(|e| {
                ApiError::InvalidResponse(format!("Invalid operands '{}': {}", raw, e))
            }),
        }
    }
}

impl TestResponse {
    pub fn into_domain(self) -> Result<TestDefinition, ApiError> {
        let sections = self
            .sections
            .into_iter()
            .map(|section| {
                let questions = section
                    .questions
                    .into_iter()
                    .map(|q| {
                        Ok(Question::new(
                            q.uuid,
                            q.order,
                            q.operands.into_vec()?,
                            q.operation,
                        ))
                    })
                    .collect::<Result<Vec<_>, ApiError>>()?;
                Ok(Section::new(section.uuid, section.section_type, questions))
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(TestDefinition::new(
            self.uuid,
            self.title,
            self.duration_minutes,
            sections,
        ))
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Response from `POST /tests/{id}/start-session`
#[derive(Debug, Deserialize)]
pub struct StartSessionResponse {
    pub student_test_uuid: SessionId,
}

/// Response from `GET /sessions/{sid}/remaining-duration`
#[derive(Debug, Deserialize)]
pub struct RemainingDurationResponse {
    pub status: String,
    /// Seconds; may be fractional or negative once time is up
    pub remaining_duration: f64,
}

impl From<RemainingDurationResponse> for RemainingDuration {
    fn from(r: RemainingDurationResponse) -> Self {
        let seconds = r.remaining_duration.max(0.0).floor();
        RemainingDuration {
            status: RemoteSessionStatus::parse(&r.status),
            remaining_seconds: seconds.min(f64::from(u32::MAX)) as u32,
        }
    }
}

/// Body of `POST /sessions/{sid}/answers/{questionId}`
#[derive(Debug, Serialize)]
pub struct AnswerRequest<'a> {
    pub answer_text: &'a str,
}

/// One element of `GET /sessions/{sid}/answers`
#[derive(Debug, Deserialize)]
pub struct AnswerResponse {
    pub question_uuid: QuestionId,
    pub answer_text: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl From<AnswerResponse> for RemoteAnswer {
    fn from(a: AnswerResponse) -> Self {
        RemoteAnswer {
            question_id: a.question_uuid,
            answer_text: a.answer_text,
            submitted_at: a.submitted_at,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Graded result of a submitted attempt (`GET /sessions/{sid}/result`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub score: f64,
    pub total_questions: u32,
    pub correct_answers: u32,
    #[serde(default)]
    pub sections: Vec<SectionScore>,
}

/// Per-section breakdown of a [`TestResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionScore {
    #[serde(alias = "section_uuid")]
    pub section_id: String,
    pub correct: u32,
    pub total: u32,
}
