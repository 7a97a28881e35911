//! Test definition entities
//!
//! A [`TestDefinition`] is owned by the remote API and is immutable on the
//! client. A copy is kept inside the session snapshot so a test can be
//! continued while offline.

use serde::{Deserialize, Serialize};

use super::newtypes::{QuestionId, TestId};

/// Kind of a test section
///
/// The kind drives how the presentation layer renders the section and how
/// many questions fit on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionKind {
    /// Column addition/subtraction drills
    Addition,
    /// Multiplication and division drills
    MulDiv,
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionKind::Addition => write!(f, "ADDITION"),
            SectionKind::MulDiv => write!(f, "MUL_DIV"),
        }
    }
}

/// Arithmetic operation a question asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Multiply,
    Divide,
}

/// A single question of a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    position: u32,
    operands: Vec<i64>,
    operation: Operation,
}

impl Question {
    pub fn new(id: QuestionId, position: u32, operands: Vec<i64>, operation: Operation) -> Self {
        Self {
            id,
            position,
            operands,
            operation,
        }
    }

    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    /// Ordered position of the question within its section
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Signed operands, in display order
    pub fn operands(&self) -> &[i64] {
        &self.operands
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

/// An ordered group of questions of the same kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    id: String,
    kind: SectionKind,
    questions: Vec<Question>,
}

impl Section {
    /// Creates a section; questions are kept sorted by position
    pub fn new(id: impl Into<String>, kind: SectionKind, mut questions: Vec<Question>) -> Self {
        questions.sort_by_key(Question::position);
        Self {
            id: id.into(),
            kind,
            questions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of pages needed to show all questions at `per_page` per page
    ///
    /// An empty section still has one (empty) page.
    pub fn page_count(&self, per_page: u32) -> u32 {
        let per_page = per_page.max(1) as usize;
        let pages = self.questions.len().div_ceil(per_page);
        pages.max(1) as u32
    }
}

/// Immutable, server-sourced description of a test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinition {
    id: TestId,
    title: String,
    duration_minutes: u32,
    sections: Vec<Section>,
}

impl TestDefinition {
    pub fn new(
        id: TestId,
        title: impl Into<String>,
        duration_minutes: u32,
        sections: Vec<Section>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            duration_minutes,
            sections,
        }
    }

    pub fn id(&self) -> &TestId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Full test duration in seconds, the starting value of the countdown
    pub fn duration_seconds(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Total number of questions across all sections
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// Looks up a question by id across all sections
    pub fn find_question(&self, id: &QuestionId) -> Option<&Question> {
        self.sections
            .iter()
            .flat_map(|s| s.questions.iter())
            .find(|q| q.id() == id)
    }
}
