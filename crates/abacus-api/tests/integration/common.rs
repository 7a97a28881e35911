//! Shared test helpers for REST API integration tests
//!
//! Each helper mounts the endpoints a test needs on a wiremock server and
//! returns a client pointing at it.

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use abacus_api::ExamApiClient;

pub const TOKEN: &str = "test-access-token";

pub const TEST_ID: &str = "0b3c8f0e-6a51-4d0f-9a5c-5b2f1f0d7e21";
pub const SESSION_ID: &str = "6f1c4a8e-2b7d-4c0e-9a51-3d2e8f7b6a10";
pub const QUESTION_1: &str = "8d0e7c2a-1f3b-4e5d-a6c7-b8d9e0f1a2b3";
pub const QUESTION_2: &str = "1a2b3c4d-5e6f-4a8b-9c0d-1e2f3a4b5c6d";

/// Starts a mock server and returns a client authenticated with [`TOKEN`]
pub async fn setup_api_mock() -> (MockServer, ExamApiClient) {
    let server = MockServer::start().await;
    let client = ExamApiClient::with_base_url(server.uri()).with_access_token(TOKEN);
    (server, client)
}

/// A client pointed at a local port nothing listens on
pub fn unreachable_client() -> ExamApiClient {
    ExamApiClient::with_base_url("http://127.0.0.1:9").with_access_token(TOKEN)
}

/// Mounts `GET /tests/{TEST_ID}` returning a two-section test
pub async fn mount_test_definition(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/tests/{}", TEST_ID)))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uuid": TEST_ID,
            "title": "Level 1 drill",
            "duration_minutes": 5,
            "sections": [
                {
                    "uuid": "sec-add",
                    "section_type": "ADDITION",
                    "questions": [
                        {"uuid": QUESTION_1, "order": 1, "operands": [12, -5, 7], "operation": "add"}
                    ]
                },
                {
                    "uuid": "sec-mul",
                    "section_type": "MUL_DIV",
                    "questions": [
                        {"uuid": QUESTION_2, "order": 1, "operands": "[6, 7]", "operation": "multiply"}
                    ]
                }
            ]
        })))
        .mount(server)
        .await;
}

/// Mounts `method path` answering with a bare status code
pub async fn mount_status(server: &MockServer, verb: &str, route: &str, status: u16) {
    Mock::given(method(verb))
        .and(path(route.to_string()))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
