//! Integration tests for the happy-path session endpoints

use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use abacus_api::HttpExamApi;
use abacus_core::domain::{QuestionId, SectionKind, SessionId, TestId};
use abacus_core::ports::{IExamApi, IReachability, RemoteSessionStatus};

use crate::common::{self, QUESTION_1, QUESTION_2, SESSION_ID, TEST_ID};

fn test_id() -> TestId {
    TEST_ID.parse().unwrap()
}

fn session_id() -> SessionId {
    SESSION_ID.parse().unwrap()
}

#[tokio::test]
async fn test_get_test_maps_sections_and_operands() {
    let (server, client) = common::setup_api_mock().await;
    common::mount_test_definition(&server).await;

    let test = client.get_test(&test_id()).await.expect("get_test failed");

    assert_eq!(test.title(), "Level 1 drill");
    assert_eq!(test.duration_seconds(), 300);
    assert_eq!(test.sections().len(), 2);
    assert_eq!(test.sections()[1].kind(), SectionKind::MulDiv);
    assert_eq!(test.sections()[0].questions()[0].operands(), &[12, -5, 7]);
    assert_eq!(test.sections()[1].questions()[0].operands(), &[6, 7]);
}

#[tokio::test]
async fn test_start_and_begin_session() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("POST"))
        .and(path(format!("/tests/{}/start-session", TEST_ID)))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(serde_json::json!({ "student_test_uuid": SESSION_ID })),
        )
        .expect(1)
        .mount(&server)
        .await;
    common::mount_status(&server, "POST", &format!("/sessions/{}/begin", SESSION_ID), 200).await;

    let api = HttpExamApi::new(client);
    let sid = api.create_session(&test_id()).await.unwrap();
    assert_eq!(sid, session_id());
    api.begin_session(&sid).await.unwrap();
}

#[tokio::test]
async fn test_remaining_duration() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/sessions/{}/remaining-duration", SESSION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "IN_PROGRESS",
            "remaining_duration": 123.9
        })))
        .mount(&server)
        .await;

    let remaining = client.remaining_duration(&session_id()).await.unwrap();
    assert_eq!(remaining.status, RemoteSessionStatus::InProgress);
    assert_eq!(remaining.remaining_seconds, 123);
}

#[tokio::test]
async fn test_submit_answer_sends_answer_text() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("POST"))
        .and(path(format!("/sessions/{}/answers/{}", SESSION_ID, QUESTION_1)))
        .and(body_json(serde_json::json!({ "answer_text": "14" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let question: QuestionId = QUESTION_1.parse().unwrap();
    client
        .submit_answer(&session_id(), &question, "14")
        .await
        .expect("submit_answer failed");
}

#[tokio::test]
async fn test_list_answers() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/sessions/{}/answers", SESSION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"question_uuid": QUESTION_1, "answer_text": "14", "submitted_at": "2026-10-19T09:30:00Z"},
            {"question_uuid": QUESTION_2, "answer_text": "42"}
        ])))
        .mount(&server)
        .await;

    let answers = HttpExamApi::new(client)
        .list_answers(&session_id())
        .await
        .unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].answer_text, "14");
    assert!(answers[0].submitted_at.is_some());
    assert_eq!(answers[1].question_id, QUESTION_2.parse().unwrap());
    assert!(answers[1].submitted_at.is_none());
}

#[tokio::test]
async fn test_get_result() {
    let (server, client) = common::setup_api_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/sessions/{}/result", SESSION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "score": 50.0,
            "total_questions": 2,
            "correct_answers": 1,
            "sections": [
                {"section_uuid": "sec-add", "correct": 1, "total": 1},
                {"section_uuid": "sec-mul", "correct": 0, "total": 1}
            ]
        })))
        .mount(&server)
        .await;

    let result = client.get_result(&session_id()).await.unwrap();
    assert_eq!(result.correct_answers, 1);
    assert_eq!(result.sections[1].section_id, "sec-mul");
}

#[tokio::test]
async fn test_reachability_counts_any_response() {
    let (server, client) = common::setup_api_mock().await;
    // No mocks mounted: wiremock answers 404, which still proves reachability
    let api = HttpExamApi::new(client);
    assert!(api.is_reachable().await);
    drop(server);

    let offline = HttpExamApi::new(common::unreachable_client());
    assert!(!offline.is_reachable().await);
}
