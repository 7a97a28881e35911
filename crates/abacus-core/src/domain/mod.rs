//! Domain entities and business logic
//!
//! This module contains the core domain types for the test-taking client:
//! - Newtypes for type-safe identifiers
//! - Test definitions (sections, questions) as served by the API
//! - The mutable test session and its state machine
//! - Pending (unsynced) answers with an explicit retry budget
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod pending;
pub mod session;
pub mod test_definition;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use pending::{AttemptsRemaining, PendingAnswer};
pub use session::{SessionStatus, TestSession, TickOutcome};
pub use test_definition::{Operation, Question, Section, SectionKind, TestDefinition};
