//! Integration tests for abacus-api
//!
//! Uses wiremock to simulate the REST backend and verifies end-to-end
//! behavior of the ExamApiClient and the HttpExamApi port adapter.

mod common;

mod test_errors;
mod test_sessions;
