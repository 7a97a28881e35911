//! Integration tests for status-code classification

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use abacus_api::{ApiError, HttpExamApi};
use abacus_core::domain::{QuestionId, SessionId};
use abacus_core::ports::{IExamApi, RemoteError};

use crate::common::{self, QUESTION_1, SESSION_ID};

fn session_id() -> SessionId {
    SESSION_ID.parse().unwrap()
}

#[tokio::test]
async fn test_submit_conflict_is_already_completed() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("POST"))
        .and(path(format!("/sessions/{}/submit", SESSION_ID)))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(serde_json::json!({ "detail": "Test already submitted" })),
        )
        .mount(&server)
        .await;

    let err = client.submit_session(&session_id()).await.unwrap_err();
    assert!(matches!(&err, ApiError::Conflict(msg) if msg == "Test already submitted"));

    let err = HttpExamApi::new(client)
        .submit_session(&session_id())
        .await
        .unwrap_err();
    assert_eq!(err, RemoteError::AlreadyCompleted);
}

#[tokio::test]
async fn test_validation_failure_is_rejected() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("POST"))
        .and(path(format!("/sessions/{}/answers/{}", SESSION_ID, QUESTION_1)))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(serde_json::json!({ "message": "answer_text must be numeric" })),
        )
        .mount(&server)
        .await;

    let question: QuestionId = QUESTION_1.parse().unwrap();
    let err = HttpExamApi::new(client)
        .submit_answer(&session_id(), &question, "abc")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RemoteError::Rejected {
            status: 422,
            message: "answer_text must be numeric".into()
        }
    );
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_unauthorized() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_status(&server, "POST", &format!("/sessions/{}/begin", SESSION_ID), 401).await;

    let err = client.begin_session(&session_id()).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_status(&server, "POST", &format!("/sessions/{}/submit", SESSION_ID), 503).await;

    let err = HttpExamApi::new(client)
        .submit_session(&session_id())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Server { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_throttle_reads_retry_after() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/sessions/{}/remaining-duration", SESSION_ID)))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "9"))
        .mount(&server)
        .await;

    let err = client.remaining_duration(&session_id()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::TooManyRequests { retry_after } if retry_after == Duration::from_secs(9)
    ));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/sessions/{}/remaining-duration", SESSION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = HttpExamApi::new(client)
        .remaining_duration(&session_id())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_connection_refused_is_unreachable() {
    let err = HttpExamApi::new(common::unreachable_client())
        .begin_session(&session_id())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Unreachable(_)));
    assert!(err.is_transient());
}
