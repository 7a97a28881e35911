//! HttpExamApi - IExamApi implementation over the REST client
//!
//! Wraps the [`ExamApiClient`] and maps its [`ApiError`](crate::ApiError)
//! into the port-level [`RemoteError`] classification.

use tracing::debug;

use abacus_core::domain::{QuestionId, SessionId, TestDefinition, TestId};
use abacus_core::ports::{
    IExamApi, IReachability, RemainingDuration, RemoteAnswer, RemoteError,
};

use crate::client::ExamApiClient;

/// `IExamApi` and `IReachability` adapter for the REST backend
#[derive(Clone)]
pub struct HttpExamApi {
    client: ExamApiClient,
}

impl HttpExamApi {
    pub fn new(client: ExamApiClient) -> Self {
        Self { client }
    }

    /// The wrapped client, for calls outside the port (e.g. results)
    pub fn client(&self) -> &ExamApiClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IExamApi for HttpExamApi {
    async fn fetch_test(&self, test_id: &TestId) -> Result<TestDefinition, RemoteError> {
        debug!(test_id = %test_id, "HttpExamApi::fetch_test");
        Ok(self.client.get_test(test_id).await?)
    }

    async fn create_session(&self, test_id: &TestId) -> Result<SessionId, RemoteError> {
        debug!(test_id = %test_id, "HttpExamApi::create_session");
        Ok(self.client.start_session(test_id).await?)
    }

    async fn begin_session(&self, session_id: &SessionId) -> Result<(), RemoteError> {
        debug!(session_id = %session_id, "HttpExamApi::begin_session");
        Ok(self.client.begin_session(session_id).await?)
    }

    async fn remaining_duration(
        &self,
        session_id: &SessionId,
    ) -> Result<RemainingDuration, RemoteError> {
        Ok(self.client.remaining_duration(session_id).await?)
    }

    async fn submit_answer(
        &self,
        session_id: &SessionId,
        question_id: &QuestionId,
        answer_text: &str,
    ) -> Result<(), RemoteError> {
        Ok(self
            .client
            .submit_answer(session_id, question_id, answer_text)
            .await?)
    }

    async fn list_answers(&self, session_id: &SessionId) -> Result<Vec<RemoteAnswer>, RemoteError> {
        Ok(self.client.list_answers(session_id).await?)
    }

    async fn submit_session(&self, session_id: &SessionId) -> Result<(), RemoteError> {
        debug!(session_id = %session_id, "HttpExamApi::submit_session");
        Ok(self.client.submit_session(session_id).await?)
    }
}

#[async_trait::async_trait]
impl IReachability for HttpExamApi {
    async fn is_reachable(&self) -> bool {
        self.client.ping().await
    }
}
