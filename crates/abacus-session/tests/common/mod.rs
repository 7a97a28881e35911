//! Shared fakes and fixtures for session controller tests
//!
//! [`FakeExamApi`] behaves like a tiny in-process server: it remembers the
//! answers it accepted, can be made unreachable, and can be scripted to fail
//! specific calls. Every call is logged in order so tests can assert on
//! sequencing.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use abacus_cache::InMemorySessionStore;
use abacus_core::config::PaginationConfig;
use abacus_core::domain::{
    Operation, Question, QuestionId, Section, SectionKind, SessionId, TestDefinition, TestId,
};
use abacus_core::ports::{
    Destination, IExamApi, INavigator, INotificationService, ISessionStore, Notification,
    RemainingDuration, RemoteAnswer, RemoteError, RemoteSessionStatus,
};
use abacus_session::{
    ConnectivityMonitor, ControllerDeps, ControllerSettings, TestSessionController,
};

// ============================================================================
// Fixtures
// ============================================================================

/// A test with a 12-question addition section and a 4-question mul/div section
pub fn sample_test(minutes: u32) -> TestDefinition {
    let addition = (0..12)
        .map(|i| Question::new(QuestionId::new(), i, vec![10, i as i64, -3], Operation::Add))
        .collect();
    let mul_div = (0..4)
        .map(|i| Question::new(QuestionId::new(), i, vec![6, i as i64 + 1], Operation::Multiply))
        .collect();
    TestDefinition::new(
        TestId::new(),
        "Mixed drill",
        minutes,
        vec![
            Section::new("sec-add", SectionKind::Addition, addition),
            Section::new("sec-mul", SectionKind::MulDiv, mul_div),
        ],
    )
}

pub fn server_error() -> RemoteError {
    RemoteError::Server {
        status: 503,
        message: "unavailable".into(),
    }
}

/// Settings with no debounce window and no time-up pause
pub fn instant_settings() -> ControllerSettings {
    ControllerSettings {
        tick_interval: Duration::from_secs(1),
        reconcile_interval: Duration::from_secs(30),
        answer_debounce: Duration::ZERO,
        debounce_poll: Duration::from_millis(200),
        time_up_notice: Duration::ZERO,
        max_answer_attempts: 3,
        pagination: PaginationConfig {
            addition_per_page: 10,
            mul_div_per_page: 10,
        },
    }
}

// ============================================================================
// FakeExamApi
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchTest,
    CreateSession,
    BeginSession,
    RemainingDuration,
    SubmitAnswer(QuestionId, String),
    ListAnswers,
    SubmitSession,
}

struct FakeState {
    reachable: bool,
    calls: Vec<Call>,
    answer_failures: HashMap<QuestionId, VecDeque<RemoteError>>,
    submit_failure: Option<RemoteError>,
    remote_status: RemoteSessionStatus,
    remote_remaining: Option<u32>,
    accepted: BTreeMap<QuestionId, String>,
    submitted: bool,
}

pub struct FakeExamApi {
    test: TestDefinition,
    session_id: SessionId,
    state: Mutex<FakeState>,
}

impl FakeExamApi {
    pub fn new(test: TestDefinition) -> Self {
        Self {
            test,
            session_id: SessionId::new(),
            state: Mutex::new(FakeState {
                reachable: true,
                calls: Vec::new(),
                answer_failures: HashMap::new(),
                submit_failure: None,
                remote_status: RemoteSessionStatus::Pending,
                remote_remaining: None,
                accepted: BTreeMap::new(),
                submitted: false,
            }),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unwrap().reachable = reachable;
    }

    /// The next submissions of `question_id` fail with these errors, in order
    pub fn fail_answers(&self, question_id: QuestionId, errors: Vec<RemoteError>) {
        self.state
            .lock()
            .unwrap()
            .answer_failures
            .insert(question_id, errors.into());
    }

    /// Every session submission fails with `error` until cleared with `None`
    pub fn fail_submit(&self, error: Option<RemoteError>) {
        self.state.lock().unwrap().submit_failure = error;
    }

    pub fn set_remote_status(&self, status: RemoteSessionStatus) {
        self.state.lock().unwrap().remote_status = status;
    }

    pub fn set_remote_remaining(&self, seconds: u32) {
        self.state.lock().unwrap().remote_remaining = Some(seconds);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn accepted(&self) -> BTreeMap<QuestionId, String> {
        self.state.lock().unwrap().accepted.clone()
    }

    /// Number of `submit_answer` calls for one question, failed ones included
    pub fn answer_attempts(&self, question_id: &QuestionId) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::SubmitAnswer(q, _) if q == question_id))
            .count()
    }

    pub fn submit_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == Call::SubmitSession)
            .count()
    }

    fn enter(&self, call: Call) -> Result<std::sync::MutexGuard<'_, FakeState>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.reachable {
            Ok(state)
        } else {
            Err(RemoteError::Unreachable("connection refused".into()))
        }
    }
}

#[async_trait::async_trait]
impl IExamApi for FakeExamApi {
    async fn fetch_test(&self, _test_id: &TestId) -> Result<TestDefinition, RemoteError> {
        self.enter(Call::FetchTest)?;
        Ok(self.test.clone())
    }

    async fn create_session(&self, _test_id: &TestId) -> Result<SessionId, RemoteError> {
        self.enter(Call::CreateSession)?;
        Ok(self.session_id)
    }

    async fn begin_session(&self, _session_id: &SessionId) -> Result<(), RemoteError> {
        let mut state = self.enter(Call::BeginSession)?;
        state.remote_status = RemoteSessionStatus::InProgress;
        Ok(())
    }

    async fn remaining_duration(
        &self,
        _session_id: &SessionId,
    ) -> Result<RemainingDuration, RemoteError> {
        let state = self.enter(Call::RemainingDuration)?;
        Ok(RemainingDuration {
            status: state.remote_status.clone(),
            remaining_seconds: state
                .remote_remaining
                .unwrap_or_else(|| self.test.duration_seconds()),
        })
    }

    async fn submit_answer(
        &self,
        _session_id: &SessionId,
        question_id: &QuestionId,
        answer_text: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.enter(Call::SubmitAnswer(*question_id, answer_text.to_string()))?;
        if let Some(err) = state
            .answer_failures
            .get_mut(question_id)
            .and_then(|queue| queue.pop_front())
        {
            return Err(err);
        }
        state.accepted.insert(*question_id, answer_text.to_string());
        Ok(())
    }

    async fn list_answers(&self, _session_id: &SessionId) -> Result<Vec<RemoteAnswer>, RemoteError> {
        let state = self.enter(Call::ListAnswers)?;
        Ok(state
            .accepted
            .iter()
            .map(|(q, a)| RemoteAnswer {
                question_id: *q,
                answer_text: a.clone(),
                submitted_at: None,
            })
            .collect())
    }

    async fn submit_session(&self, _session_id: &SessionId) -> Result<(), RemoteError> {
        let mut state = self.enter(Call::SubmitSession)?;
        if let Some(err) = state.submit_failure.clone() {
            return Err(err);
        }
        if state.submitted {
            return Err(RemoteError::AlreadyCompleted);
        }
        state.submitted = true;
        state.remote_status = RemoteSessionStatus::Completed;
        Ok(())
    }
}

// ============================================================================
// Recording adapters
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, category: &str) -> usize {
        self.all().iter().filter(|n| n.category == category).count()
    }

    pub fn titles(&self) -> Vec<String> {
        self.all().into_iter().map(|n| n.title).collect()
    }
}

#[async_trait::async_trait]
impl INotificationService for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    seen: Mutex<Vec<Destination>>,
}

impl RecordingNavigator {
    pub fn destinations(&self) -> Vec<Destination> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl INavigator for RecordingNavigator {
    async fn navigate(&self, destination: Destination) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(destination);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// One fake world: server, store, toasts, navigation and connectivity
pub struct Harness {
    pub test: TestDefinition,
    pub api: Arc<FakeExamApi>,
    pub store: Arc<dyn ISessionStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<RecordingNavigator>,
    pub connectivity: ConnectivityMonitor,
}

impl Harness {
    pub fn new(minutes: u32) -> Self {
        Self::with_store(minutes, Arc::new(InMemorySessionStore::new()))
    }

    pub fn with_store(minutes: u32, store: Arc<dyn ISessionStore>) -> Self {
        let test = sample_test(minutes);
        Self {
            api: Arc::new(FakeExamApi::new(test.clone())),
            test,
            store,
            notifier: Arc::new(RecordingNotifier::default()),
            navigator: Arc::new(RecordingNavigator::default()),
            connectivity: ConnectivityMonitor::new(true),
        }
    }

    pub fn deps(&self) -> ControllerDeps {
        ControllerDeps {
            api: self.api.clone(),
            store: self.store.clone(),
            notifier: self.notifier.clone(),
            navigator: self.navigator.clone(),
            connectivity: self.connectivity.clone(),
        }
    }

    pub fn controller(&self) -> TestSessionController {
        self.controller_with(instant_settings())
    }

    pub fn controller_with(&self, settings: ControllerSettings) -> TestSessionController {
        TestSessionController::new(*self.test.id(), self.deps(), settings)
    }

    /// A controller over a different store, as after an app restart
    pub fn controller_on(&self, store: Arc<dyn ISessionStore>) -> TestSessionController {
        let deps = ControllerDeps {
            store,
            ..self.deps()
        };
        TestSessionController::new(*self.test.id(), deps, instant_settings())
    }

    pub fn go_offline(&self) {
        self.api.set_reachable(false);
        self.connectivity.set_online(false);
    }

    pub fn go_online(&self) {
        self.api.set_reachable(true);
        self.connectivity.set_online(true);
    }

    pub fn question(&self, section: usize, index: usize) -> QuestionId {
        *self.test.sections()[section].questions()[index].id()
    }
}
