//! Abacus API - REST client for the test-taking backend
//!
//! Provides an async client for:
//! - Fetching test definitions
//! - Creating, beginning and submitting student-test sessions
//! - Recording answers and reading back the server's view of them
//! - Reading the authoritative remaining time and the graded result
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client and endpoint methods
//! - [`dto`] - Wire types and their mapping to domain types
//! - [`provider`] - `IExamApi` / `IReachability` implementation

pub mod client;
pub mod dto;
pub mod provider;

use std::time::Duration;

use abacus_core::ports::RemoteError;
use thiserror::Error;

pub use client::ExamApiClient;
pub use dto::{SectionScore, TestResult};
pub use provider::HttpExamApi;

/// Errors that can occur when communicating with the REST API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication credentials are missing, invalid or expired (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The session is already completed (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other 4xx response, typically a validation failure
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for RemoteError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized(message) => RemoteError::Rejected {
                status: 401,
                message,
            },
            ApiError::Forbidden(message) => RemoteError::Rejected {
                status: 403,
                message,
            },
            ApiError::NotFound(message) => RemoteError::Rejected {
                status: 404,
                message,
            },
            ApiError::Rejected { status, message } => RemoteError::Rejected { status, message },
            ApiError::Conflict(_) => RemoteError::AlreadyCompleted,
            ApiError::TooManyRequests { retry_after } => RemoteError::Throttled {
                retry_after_secs: retry_after.as_secs(),
            },
            ApiError::ServerError { status, message } => RemoteError::Server { status, message },
            ApiError::NetworkError(e) if e.is_decode() => RemoteError::InvalidResponse(e.to_string()),
            ApiError::NetworkError(e) => RemoteError::Unreachable(e.to_string()),
            ApiError::InvalidResponse(message) => RemoteError::InvalidResponse(message),
        }
    }
}
