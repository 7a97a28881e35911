//! REST API client
//!
//! Provides a typed HTTP client for the test-taking backend. Handles the
//! bearer token, per-request timeout, JSON (de)serialization, endpoint
//! construction and status-code classification.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use abacus_api::client::ExamApiClient;
//! use abacus_core::domain::TestId;
//!
//! # async fn example(test_id: TestId) -> Result<(), abacus_api::ApiError> {
//! let client = ExamApiClient::with_base_url("https://api.abacus.example/v1")
//!     .with_access_token("access-token-here");
//! let test = client.get_test(&test_id).await?;
//! println!("{} ({} min)", test.title(), test.duration_minutes());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use abacus_core::config::ApiConfig;
use abacus_core::domain::{QuestionId, SessionId, TestDefinition, TestId};
use abacus_core::ports::{RemainingDuration, RemoteAnswer};

use crate::dto::{
    AnswerRequest, AnswerResponse, RemainingDurationResponse, StartSessionResponse, TestResponse,
    TestResult,
};
use crate::ApiError;

/// Default retry-after duration when the header is missing or unparseable
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Longest Retry-After honoured from an HTTP-date header
const MAX_RETRY_AFTER_SECS: u64 = 3600;

/// Error body shapes the backend uses (`{"detail": ...}` or `{"message": ...}`)
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    message: Option<String>,
}

/// HTTP client for the test-taking REST API
#[derive(Clone)]
pub struct ExamApiClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, without trailing slash
    base_url: String,
    /// Bearer token, if the student is logged in
    access_token: Option<String>,
}

impl ExamApiClient {
    /// Creates a client from the `api` configuration section
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// Creates a client with default settings for the given base URL
    /// (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    /// Sets the bearer token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Updates the bearer token (e.g., after the shell refreshed the login)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = Some(token.into());
        debug!("Updated API access token");
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Prepends the base URL and adds the Authorization header when a token
    /// is set.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, &url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and maps non-success statuses to [`ApiError`]
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let response = self.execute(self.request(Method::GET, path)).await?;
        parse_json(response).await
    }

    // ========================================================================
    // Tests
    // ========================================================================

    /// `GET /tests/{id}`
    pub async fn get_test(&self, test_id: &TestId) -> Result<TestDefinition, ApiError> {
        let response: TestResponse = self.get_json(&format!("/tests/{}", test_id)).await?;
        response.into_domain()
    }

    /// `POST /tests/{id}/start-session`
    pub async fn start_session(&self, test_id: &TestId) -> Result<SessionId, ApiError> {
        let path = format!("/tests/{}/start-session", test_id);
        debug!(path = %path, "POST");
        let response = self.execute(self.request(Method::POST, &path)).await?;
        let body: StartSessionResponse = parse_json(response).await?;
        Ok(body.student_test_uuid)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// `POST /sessions/{sid}/begin`
    pub async fn begin_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let path = format!("/sessions/{}/begin", session_id);
        debug!(path = %path, "POST");
        self.execute(self.request(Method::POST, &path)).await?;
        Ok(())
    }

    /// `GET /sessions/{sid}/remaining-duration`
    pub async fn remaining_duration(
        &self,
        session_id: &SessionId,
    ) -> Result<RemainingDuration, ApiError> {
        let response: RemainingDurationResponse = self
            .get_json(&format!("/sessions/{}/remaining-duration", session_id))
            .await?;
        Ok(response.into())
    }

    /// `POST /sessions/{sid}/answers/{questionId}`
    pub async fn submit_answer(
        &self,
        session_id: &SessionId,
        question_id: &QuestionId,
        answer_text: &str,
    ) -> Result<(), ApiError> {
        let path = format!("/sessions/{}/answers/{}", session_id, question_id);
        debug!(path = %path, "POST");
        self.execute(
            self.request(Method::POST, &path)
                .json(&AnswerRequest { answer_text }),
        )
        .await?;
        Ok(())
    }

    /// `GET /sessions/{sid}/answers`
    pub async fn list_answers(&self, session_id: &SessionId) -> Result<Vec<RemoteAnswer>, ApiError> {
        let answers: Vec<AnswerResponse> = self
            .get_json(&format!("/sessions/{}/answers", session_id))
            .await?;
        Ok(answers.into_iter().map(RemoteAnswer::from).collect())
    }

    /// `POST /sessions/{sid}/submit`
    ///
    /// A 409 response surfaces as [`ApiError::Conflict`].
    pub async fn submit_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let path = format!("/sessions/{}/submit", session_id);
        debug!(path = %path, "POST");
        self.execute(self.request(Method::POST, &path)).await?;
        Ok(())
    }

    /// `GET /sessions/{sid}/result`
    pub async fn get_result(&self, session_id: &SessionId) -> Result<TestResult, ApiError> {
        self.get_json(&format!("/sessions/{}/result", session_id))
            .await
    }

    /// Issues a request to the base URL; any HTTP response counts as reachable
    pub async fn ping(&self) -> bool {
        match self.request(Method::GET, "").send().await {
            Ok(response) => {
                debug!(status = %response.status(), "API reachable");
                true
            }
            Err(e) => {
                debug!(error = %e, "API unreachable");
                false
            }
        }
    }
}

// ============================================================================
// Response helpers
// ============================================================================

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
        .unwrap_or(DEFAULT_RETRY_AFTER);

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body, status);

    warn!(status = status.as_u16(), message = %message, "API request failed");

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::CONFLICT => ApiError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => ApiError::TooManyRequests { retry_after },
        s if s.is_server_error() => ApiError::ServerError {
            status: s.as_u16(),
            message,
        },
        s => ApiError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

/// Extracts a human-readable message from an error body
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message {
            return message;
        }
        match parsed.detail {
            Some(serde_json::Value::String(detail)) => return detail,
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    }
}

/// Parses a `Retry-After` header value (delta-seconds or HTTP-date)
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            if let Some(secs) = (target - now)
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= MAX_RETRY_AFTER_SECS)
            {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
