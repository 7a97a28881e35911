//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including invalid state transitions and references to unknown
//! questions or sections.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// The question does not belong to the test being taken
    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    /// Section index outside the test's section list
    #[error("Section index {index} out of range (test has {count} sections)")]
    SectionOutOfRange {
        /// Requested section index
        index: usize,
        /// Number of sections in the test
        count: usize,
    },

    /// Page number outside the section's page range
    #[error("Page {page} out of range for section {section} ({pages} pages)")]
    PageOutOfRange {
        /// Section index
        section: usize,
        /// Requested page
        page: u32,
        /// Number of pages in the section
        pages: u32,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::UnknownQuestion("q-1".to_string());
        assert_eq!(err.to_string(), "Unknown question: q-1");

        let err = DomainError::InvalidState {
            from: "SUBMITTED".to_string(),
            to: "IN_PROGRESS".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition from SUBMITTED to IN_PROGRESS"
        );

        let err = DomainError::PageOutOfRange {
            section: 1,
            page: 4,
            pages: 3,
        };
        assert_eq!(err.to_string(), "Page 4 out of range for section 1 (3 pages)");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidId("x".to_string());
        let err2 = DomainError::InvalidId("x".to_string());
        let err3 = DomainError::InvalidId("y".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
