//! Test session controller
//!
//! Owns one timed attempt at one test and keeps it consistent across
//! disconnections and reloads:
//!
//! - **Countdown**: one second per tick, snapshot persisted on even values,
//!   periodically reconciled against the server (never moving up)
//! - **Answers**: recorded immediately, debounced per question, then queued
//!   durably and drained to the server while online
//! - **Submission**: immediate when online; when offline a durable intent
//!   (or expiry) flag is written and the submission completes on reconnect
//! - **Resume**: a stored snapshot plus any queued answers and flags are
//!   folded back into the session before anything else happens
//!
//! ## Concurrency
//!
//! The controller is a single-owner actor. [`TestSessionController::spawn`]
//! moves it onto a task whose `tokio::select!` loop serializes UI actions,
//! connectivity transitions, the countdown, reconciliation and debounce
//! polling, so no two of them ever interleave. Every operation is also a
//! plain `async fn` on the controller for direct use.
//!
//! Storage failures never stop the attempt: they are logged, surfaced as
//! [`SessionView::storage_degraded`], and the session carries on in memory.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use abacus_core::config::{Config, PaginationConfig};
use abacus_core::domain::{
    PendingAnswer, QuestionId, SessionId, SessionStatus, TestDefinition, TestId, TestSession,
    TickOutcome,
};
use abacus_core::ports::{
    Destination, IExamApi, INavigator, INotificationService, ISessionStore, Notification,
    RemoteError, RemoteSessionStatus, StorageError,
};

use crate::connectivity::{ConnectivityMonitor, Subscription};
use crate::debounce::DebouncedAnswerQueue;
use crate::sync::{AnswerSyncEngine, SyncReport};
use crate::SessionError;

// ============================================================================
// Settings and dependencies
// ============================================================================

/// Timing and sizing knobs, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub tick_interval: Duration,
    pub reconcile_interval: Duration,
    pub answer_debounce: Duration,
    pub debounce_poll: Duration,
    pub time_up_notice: Duration,
    pub max_answer_attempts: u8,
    pub pagination: PaginationConfig,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.session.tick_interval(),
            reconcile_interval: config.session.reconcile_interval(),
            answer_debounce: config.session.answer_debounce(),
            debounce_poll: config.session.debounce_poll(),
            time_up_notice: config.session.time_up_notice(),
            max_answer_attempts: config.session.max_answer_attempts,
            pagination: config.pagination.clone(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Adapters the controller drives
#[derive(Clone)]
pub struct ControllerDeps {
    pub api: Arc<dyn IExamApi>,
    pub store: Arc<dyn ISessionStore>,
    pub notifier: Arc<dyn INotificationService>,
    pub navigator: Arc<dyn INavigator>,
    pub connectivity: ConnectivityMonitor,
}

// ============================================================================
// SessionView
// ============================================================================

/// Read-only state published for the UI after every change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub session_id: Option<SessionId>,
    pub status: SessionStatus,
    pub remaining_seconds: u32,
    pub current_section: usize,
    pub current_page: u32,
    pub answered: usize,
    /// Answers queued locally and not yet accepted by the server
    pub pending_answers: usize,
    pub online: bool,
    /// The attempt is running from local state because the server is unreachable
    pub offline_mode: bool,
    pub inputs_disabled: bool,
    /// "Time's up" notice is showing
    pub time_up_notice: bool,
    /// Local persistence failed at least once; progress may not survive a reload
    pub storage_degraded: bool,
    /// The attempt has ended and the student has been sent elsewhere
    pub finished: bool,
}

// ============================================================================
// TestSessionController
// ============================================================================

/// Orchestrates one attempt at one test
pub struct TestSessionController {
    test_id: TestId,
    deps: ControllerDeps,
    settings: ControllerSettings,
    sync: AnswerSyncEngine,
    session: Option<TestSession>,
    debounce: DebouncedAnswerQueue,
    /// Set the first time expiry is handled; guards the single time-up path
    expiry_handled: bool,
    /// Set once the attempt is over; guards the single terminal submission
    finished: bool,
    offline_mode: bool,
    time_up_notice: bool,
    storage_degraded: bool,
    pending_answers: usize,
    /// Answers the store refused to queue, held until they can be sent
    unqueued: Vec<PendingAnswer>,
    view_tx: watch::Sender<SessionView>,
}

impl TestSessionController {
    pub fn new(test_id: TestId, deps: ControllerDeps, settings: ControllerSettings) -> Self {
        let sync = AnswerSyncEngine::new(Arc::clone(&deps.api), Arc::clone(&deps.store));
        let (view_tx, _) = watch::channel(SessionView {
            online: deps.connectivity.current_status(),
            inputs_disabled: true,
            ..SessionView::default()
        });
        let debounce = DebouncedAnswerQueue::new(settings.answer_debounce);

        Self {
            test_id,
            deps,
            settings,
            sync,
            session: None,
            debounce,
            expiry_handled: false,
            finished: false,
            offline_mode: false,
            time_up_notice: false,
            storage_degraded: false,
            pending_answers: 0,
            unqueued: Vec::new(),
            view_tx,
        }
    }

    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    pub fn session(&self) -> Option<&TestSession> {
        self.session.as_ref()
    }

    pub fn view(&self) -> SessionView {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Answer edits still inside their debounce window
    pub fn unsettled_answers(&self) -> usize {
        self.debounce.pending_count()
    }

    // ========================================================================
    // Resume and begin
    // ========================================================================

    /// Restores the most recent stored attempt for this test, if any
    ///
    /// Queued answers are merged over the snapshot and durable flags are
    /// folded into the status. When online, the attempt is reconciled with
    /// the server (which may end it) and any owed submission is completed.
    /// Returns whether an attempt was found.
    #[tracing::instrument(level = "info", skip(self), fields(test_id = %self.test_id))]
    pub async fn resume(&mut self) -> Result<bool, SessionError> {
        let stored = match self.deps.store.load_session_for_test(&self.test_id).await {
            Ok(stored) => stored,
            Err(e) => {
                self.storage_failed("load_session_for_test", &e);
                None
            }
        };
        let Some(mut session) = stored else {
            debug!(test_id = %self.test_id, "No stored attempt to resume");
            self.publish();
            return Ok(false);
        };
        let session_id = *session.id();

        let queued = match self.deps.store.pending_answers(&session_id).await {
            Ok(queued) => queued,
            Err(e) => {
                self.storage_failed("pending_answers", &e);
                Vec::new()
            }
        };
        for entry in &queued {
            session.restore_answer(*entry.question_id(), entry.answer());
        }
        self.pending_answers = queued.len();

        let (intent, expired) = self.durable_flags(&session_id).await;
        session.apply_durable_flags(intent, expired);

        info!(
            session_id = %session_id,
            status = %session.status(),
            remaining_seconds = session.remaining_seconds(),
            queued = queued.len(),
            "Resuming test attempt"
        );

        let status = session.status();
        self.session = Some(session);
        self.finished = false;

        if status.is_terminal() {
            // Submitted but never cleared
            self.finish(Destination::Results(session_id)).await;
            return Ok(true);
        }
        if status == SessionStatus::Expired {
            self.expiry_handled = true;
            if !expired {
                self.set_expiry_flag(&session_id).await;
            }
        }

        if self.is_online() {
            match self.deps.api.list_answers(&session_id).await {
                Ok(remote) => debug!(
                    session_id = %session_id,
                    server_answers = remote.len(),
                    local_answers = self.session.as_ref().map_or(0, |s| s.answers().len()),
                    "Server-side answers before resume"
                ),
                Err(e) => debug!(session_id = %session_id, error = %e, "Could not list server answers"),
            }
            if self.has_pending_answers() {
                self.sync_queue(&session_id).await;
            }
            self.reconcile().await?;
        } else {
            info!(session_id = %session_id, "Resumed offline, continuing from local state");
            self.offline_mode = true;
            self.publish();
        }
        Ok(true)
    }

    /// Starts a new attempt: fetch the test, create and begin a session
    #[tracing::instrument(level = "info", skip(self), fields(test_id = %self.test_id))]
    pub async fn begin(&mut self) -> Result<SessionId, SessionError> {
        if self.session.is_some() && !self.finished {
            return Err(SessionError::AlreadyStarted);
        }

        let (test, session_id) = match self.start_remote().await {
            Ok(started) => started,
            Err(e) => {
                error!(test_id = %self.test_id, error = %e, "Failed to start test attempt");
                self.notify(Notification::error(
                    "Could not start the test",
                    "Check your connection and try again.",
                ))
                .await;
                return Err(e.into());
            }
        };

        let mut session = TestSession::new(session_id, self.test_id);
        session.start(test)?;
        info!(
            session_id = %session_id,
            remaining_seconds = session.remaining_seconds(),
            "Test attempt started"
        );

        self.session = Some(session);
        self.debounce.clear();
        self.expiry_handled = false;
        self.finished = false;
        self.offline_mode = false;
        self.pending_answers = 0;
        self.unqueued.clear();
        self.persist().await;
        self.publish();
        Ok(session_id)
    }

    async fn start_remote(&self) -> Result<(TestDefinition, SessionId), RemoteError> {
        let test = self.deps.api.fetch_test(&self.test_id).await?;
        let session_id = self.deps.api.create_session(&self.test_id).await?;
        self.deps.api.begin_session(&session_id).await?;
        Ok((test, session_id))
    }

    // ========================================================================
    // Countdown
    // ========================================================================

    /// Advances the countdown by one second
    pub async fn tick(&mut self) -> Result<(), SessionError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        match session.tick() {
            TickOutcome::Stopped => Ok(()),
            TickOutcome::Running { remaining_seconds } => {
                if remaining_seconds % 2 == 0 {
                    self.persist().await;
                }
                self.publish();
                Ok(())
            }
            TickOutcome::Elapsed => {
                self.persist().await;
                self.expire().await
            }
        }
    }

    /// Aligns the countdown with the server and reacts to a terminal remote state
    ///
    /// Offline or on a failed request the local countdown simply continues.
    /// While a submission is owed and the server is reachable, the reconnect
    /// sequence is re-run.
    pub async fn reconcile(&mut self) -> Result<(), SessionError> {
        if self.finished || !self.is_online() {
            return Ok(());
        }
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };

        let remote = match self.deps.api.remaining_duration(&session_id).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Reconciliation failed, keeping local countdown");
                if e.is_transient() {
                    self.offline_mode = true;
                }
                self.publish();
                return Ok(());
            }
        };
        self.offline_mode = false;

        match remote.status {
            RemoteSessionStatus::InProgress => {
                let outcome = match self.session.as_mut() {
                    Some(session) => session.apply_remote_remaining(remote.remaining_seconds),
                    None => TickOutcome::Stopped,
                };
                debug!(
                    session_id = %session_id,
                    remote_seconds = remote.remaining_seconds,
                    "Countdown reconciled"
                );
                if outcome == TickOutcome::Elapsed {
                    self.persist().await;
                    return self.expire().await;
                }
                let owed = self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.status().is_awaiting_submission());
                if !owed && self.has_pending_answers() {
                    self.sync_queue(&session_id).await;
                }
            }
            RemoteSessionStatus::Pending => {
                debug!(session_id = %session_id, "Remote attempt not started, continuing locally");
            }
            RemoteSessionStatus::Completed | RemoteSessionStatus::Expired => {
                info!(session_id = %session_id, status = ?remote.status, "Attempt already ended on the server");
                self.finish(Destination::Results(session_id)).await;
                return Ok(());
            }
            RemoteSessionStatus::Other(ref status) => {
                warn!(session_id = %session_id, status = %status, "Unknown remote attempt status, leaving test");
                self.finish(Destination::Dashboard).await;
                return Ok(());
            }
        }

        let owed = self
            .session
            .as_ref()
            .is_some_and(|s| s.status().is_awaiting_submission());
        if owed {
            return self.on_reconnect().await;
        }
        self.publish();
        Ok(())
    }

    // ========================================================================
    // Answers and pagination
    // ========================================================================

    /// Records an answer locally and schedules it for delivery
    pub fn answer(
        &mut self,
        question_id: QuestionId,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let text = text.into();
        session.record_answer(question_id, text.clone())?;
        self.debounce.push(question_id, text);
        self.publish();
        Ok(())
    }

    /// Delivers answers whose debounce window has elapsed
    ///
    /// Settled answers are queued durably first. Online, the queue is then
    /// drained (a transient failure leaves the answer queued); offline, the
    /// student is told the answer was saved locally. Answers the store
    /// refuses are held in memory and sent with the next drain.
    pub async fn flush_settled_answers(&mut self) {
        let batch = self.debounce.poll();
        if batch.is_empty() {
            return;
        }
        let Some(session_id) = self.session_id() else {
            return;
        };

        let refused = self.queue_answers(&session_id, batch).await;
        if self.is_online() {
            self.sync_queue(&session_id).await;
        } else if refused {
            warn!(
                session_id = %session_id,
                held = self.unqueued.len(),
                "Offline and storage unavailable, answers held in memory"
            );
            self.notify(Notification::sync_warning(
                "Answer not saved on this device",
                "You are offline and local storage is unavailable. \
                 Keep this page open until the connection returns.",
            ))
            .await;
        } else {
            debug!(session_id = %session_id, "Offline, answers kept in the local queue");
            self.notify(Notification::saved_locally()).await;
        }

        self.persist().await;
        self.refresh_pending_count().await;
        self.publish();
    }

    /// Moves every debounced edit into the durable queue without waiting
    async fn flush_all_answers(&mut self) {
        let batch = self.debounce.drain_all();
        if batch.is_empty() {
            return;
        }
        let Some(session_id) = self.session_id() else {
            return;
        };
        self.queue_answers(&session_id, batch).await;
        self.persist().await;
        self.refresh_pending_count().await;
    }

    /// Enqueues each answer; refused ones are held in memory
    ///
    /// Returns true if the store refused any of them.
    async fn queue_answers(
        &mut self,
        session_id: &SessionId,
        batch: Vec<(QuestionId, String)>,
    ) -> bool {
        let mut refused = false;
        for (question_id, text) in batch {
            let entry = PendingAnswer::new(question_id, text, self.settings.max_answer_attempts);
            // A newer edit replaces any held one for the same question
            self.unqueued.retain(|held| held.question_id() != &question_id);
            if let Err(e) = self.deps.store.enqueue_pending_answer(session_id, &entry).await {
                self.storage_failed("enqueue_pending_answer", &e);
                self.unqueued.push(entry);
                refused = true;
            }
        }
        refused
    }

    pub async fn select_section(&mut self, index: usize) -> Result<(), SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.select_section(index)?;
        self.persist().await;
        self.publish();
        Ok(())
    }

    /// Moves `section` to `page`, sized by the section kind's page length
    pub async fn set_page(&mut self, section: usize, page: u32) -> Result<(), SessionError> {
        let per_page = self.per_page(section);
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.set_page(section, page, per_page)?;
        self.persist().await;
        self.publish();
        Ok(())
    }

    fn per_page(&self, section: usize) -> u32 {
        self.session
            .as_ref()
            .and_then(|s| s.test())
            .and_then(|t| t.section(section))
            .map(|s| self.settings.pagination.per_page(s.kind()))
            .unwrap_or(self.settings.pagination.addition_per_page)
    }

    // ========================================================================
    // Expiry and submission
    // ========================================================================

    /// Ends the attempt because time ran out
    ///
    /// Runs at most once per attempt. Shows the time-up notice, waits for it,
    /// queues every outstanding edit, records the expiry durably and, when
    /// online, submits. A failed online submission is left to the reconnect
    /// path.
    pub async fn expire(&mut self) -> Result<(), SessionError> {
        if self.expiry_handled || self.finished {
            return Ok(());
        }
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.expire()?;
        let session_id = *session.id();
        self.expiry_handled = true;
        info!(session_id = %session_id, "Time is up");

        self.time_up_notice = true;
        self.publish();
        self.notify(Notification::time_up()).await;
        self.persist().await;
        if !self.settings.time_up_notice.is_zero() {
            tokio::time::sleep(self.settings.time_up_notice).await;
        }
        self.time_up_notice = false;

        self.flush_all_answers().await;
        self.set_expiry_flag(&session_id).await;

        if self.is_online() {
            if let Err(e) = self.finalize_online(&session_id).await {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "Submission after expiry failed, will retry on reconnect"
                );
            }
        } else {
            info!(session_id = %session_id, "Offline at expiry, submission deferred");
        }
        self.publish();
        Ok(())
    }

    /// Submits the attempt at the student's request
    ///
    /// Online, outstanding answers are synced and the attempt submitted; on
    /// failure the student is told and the attempt stays open. Offline, a
    /// durable submission intent is recorded and the status moves to
    /// PENDING_SUBMISSION until the connection returns.
    pub async fn request_submit(&mut self) -> Result<(), SessionError> {
        if self.finished {
            return Ok(());
        }
        let online = self.is_online();
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let session_id = *session.id();

        if !online {
            session.request_submission()?;
            info!(session_id = %session_id, "Offline, submission will complete on reconnect");
            if let Err(e) = self.deps.store.set_submission_intent(&session_id).await {
                self.storage_failed("set_submission_intent", &e);
            }
            self.flush_all_answers().await;
            self.persist().await;
            self.publish();
            return Ok(());
        }

        match self.finalize_online(&session_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if !matches!(e, SessionError::AnswersPending(_)) {
                    self.notify(Notification::error(
                        "Submission failed",
                        "Your test was not submitted. Please try again.",
                    ))
                    .await;
                }
                self.publish();
                Err(e)
            }
        }
    }

    /// Finalizes anything left over from an offline period
    ///
    /// Syncs the pending queue first; if any answer is still undelivered the
    /// submission is held back and the flags stay for the next attempt.
    /// Otherwise an owed submission (intent or expiry) is sent and the
    /// attempt ends. With nothing owed, nothing else happens.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn on_reconnect(&mut self) -> Result<(), SessionError> {
        if self.finished {
            return Ok(());
        }
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };
        self.offline_mode = false;
        info!(session_id = %session_id, "Connection restored, syncing queued answers");

        self.drain_queue(&session_id).await?;

        let (intent, expired) = self.durable_flags(&session_id).await;
        let owed = intent
            || expired
            || self
                .session
                .as_ref()
                .is_some_and(|s| s.status().is_awaiting_submission());
        if !owed {
            self.publish();
            return Ok(());
        }

        info!(session_id = %session_id, expired, "Completing submission recorded while offline");
        match self.submit_and_finish(&session_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.notify(Notification::error(
                    "Submission failed",
                    "Your test will be submitted once the connection is stable.",
                ))
                .await;
                self.publish();
                Err(e)
            }
        }
    }

    /// Reacts to a connectivity transition
    pub async fn connectivity_changed(&mut self, online: bool) {
        if online {
            if let Err(e) = self.on_reconnect().await {
                warn!(error = %e, "Reconnect handling incomplete");
            }
        } else if self.session.is_some() && !self.finished {
            info!("Connection lost, answers will be kept locally");
            self.offline_mode = true;
        }
        self.publish();
    }

    async fn finalize_online(&mut self, session_id: &SessionId) -> Result<(), SessionError> {
        self.flush_all_answers().await;
        self.drain_queue(session_id).await?;
        self.submit_and_finish(session_id).await
    }

    /// The single place a terminal submission is sent
    async fn submit_and_finish(&mut self, session_id: &SessionId) -> Result<(), SessionError> {
        if self.finished {
            return Ok(());
        }
        match self.deps.api.submit_session(session_id).await {
            Ok(()) => info!(session_id = %session_id, "Test attempt submitted"),
            Err(RemoteError::AlreadyCompleted) => {
                info!(session_id = %session_id, "Attempt was already submitted")
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Submission failed");
                return Err(e.into());
            }
        }

        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.mark_submitted() {
                warn!(session_id = %session_id, error = %e, "Could not mark attempt submitted");
            }
        }
        self.finish(Destination::Results(*session_id)).await;
        Ok(())
    }

    /// Clears local state and leaves the test screen
    async fn finish(&mut self, destination: Destination) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        self.finished = true;
        self.debounce.clear();
        self.pending_answers = 0;
        self.unqueued.clear();
        self.time_up_notice = false;

        if let Err(e) = self.deps.store.clear_session_state(&session_id).await {
            self.storage_failed("clear_session_state", &e);
        }
        self.publish();

        if let Err(e) = self.deps.navigator.navigate(destination).await {
            warn!(destination = ?destination, error = %e, "Navigation failed");
        }
        info!(session_id = %session_id, destination = ?destination, "Test attempt finished");
    }

    // ========================================================================
    // Queue draining
    // ========================================================================

    /// Runs one sync pass over the durable queue and the held answers
    ///
    /// Warns about dropped answers and asks the student to sign in again
    /// when the server refuses the credentials.
    async fn sync_queue(&mut self, session_id: &SessionId) -> SyncReport {
        let mut report = match self.sync.sync_pending_answers(session_id).await {
            Ok(report) => report,
            Err(e) => {
                self.storage_failed("pending_answers", &e);
                SyncReport::default()
            }
        };
        if !self.unqueued.is_empty() && !report.auth_rejected {
            let held = std::mem::take(&mut self.unqueued);
            let (held_report, kept) = self.sync.sync_unqueued(session_id, held).await;
            self.unqueued = kept;
            report.merge(held_report);
        } else if report.auth_rejected {
            report.retained += self.unqueued.len() as u32;
        }

        if report.auth_rejected {
            self.notify(Notification::sign_in_required()).await;
        }
        if !report.dropped.is_empty() {
            self.notify(Notification::sync_warning(
                "Some answers were not saved",
                format!(
                    "{} answer(s) could not be delivered and were discarded.",
                    report.dropped.len()
                ),
            ))
            .await;
        }
        self.refresh_pending_count().await;
        report
    }

    /// Like [`Self::sync_queue`], but fails if anything is left undelivered
    async fn drain_queue(&mut self, session_id: &SessionId) -> Result<(), SessionError> {
        let report = self.sync_queue(session_id).await;
        if report.auth_rejected {
            self.publish();
            return Err(SessionError::AnswersPending(report.retained as usize));
        }
        if !report.is_drained() {
            self.notify(Notification::error(
                "Answers not synced",
                "Some answers are still waiting to be sent. Submission will be retried.",
            ))
            .await;
            self.publish();
            return Err(SessionError::AnswersPending(report.retained as usize));
        }
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| *s.id())
    }

    fn is_online(&self) -> bool {
        self.deps.connectivity.current_status()
    }

    fn has_pending_answers(&self) -> bool {
        self.pending_answers > 0 || !self.unqueued.is_empty()
    }

    async fn durable_flags(&mut self, session_id: &SessionId) -> (bool, bool) {
        let intent = match self.deps.store.has_submission_intent(session_id).await {
            Ok(flag) => flag,
            Err(e) => {
                self.storage_failed("has_submission_intent", &e);
                false
            }
        };
        let expired = match self.deps.store.has_expiry_flag(session_id).await {
            Ok(flag) => flag,
            Err(e) => {
                self.storage_failed("has_expiry_flag", &e);
                false
            }
        };
        (intent, expired)
    }

    async fn set_expiry_flag(&mut self, session_id: &SessionId) {
        if let Err(e) = self.deps.store.set_expiry_flag(session_id).await {
            self.storage_failed("set_expiry_flag", &e);
        }
    }

    async fn persist(&mut self) {
        let result = match &self.session {
            Some(session) => self.deps.store.save_session_state(session).await,
            None => return,
        };
        if let Err(e) = result {
            self.storage_failed("save_session_state", &e);
        }
    }

    async fn refresh_pending_count(&mut self) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        let queued = match self.deps.store.pending_answers(&session_id).await {
            Ok(queue) => queue.len(),
            Err(e) => {
                self.storage_failed("pending_answers", &e);
                0
            }
        };
        self.pending_answers = queued + self.unqueued.len();
    }

    fn storage_failed(&mut self, operation: &'static str, err: &StorageError) {
        warn!(operation, error = %err, "Local storage failed, continuing in memory");
        self.storage_degraded = true;
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.deps.notifier.notify(&notification).await {
            warn!(title = %notification.title, error = %e, "Failed to show notification");
        }
    }

    fn publish(&self) {
        let base = SessionView {
            online: self.is_online(),
            offline_mode: self.offline_mode,
            time_up_notice: self.time_up_notice,
            storage_degraded: self.storage_degraded,
            pending_answers: self.pending_answers,
            finished: self.finished,
            inputs_disabled: true,
            ..SessionView::default()
        };
        let view = match &self.session {
            Some(session) => SessionView {
                session_id: Some(*session.id()),
                status: session.status(),
                remaining_seconds: session.remaining_seconds(),
                current_section: session.current_section(),
                current_page: session.current_page(session.current_section()),
                answered: session.answers().len(),
                inputs_disabled: self.finished
                    || self.time_up_notice
                    || !session.status().accepts_answers(),
                ..base
            },
            None => base,
        };
        self.view_tx.send_replace(view);
    }

    // ========================================================================
    // Actor loop
    // ========================================================================

    /// Applies one action from the handle
    pub async fn handle_action(&mut self, action: SessionAction) {
        match action {
            SessionAction::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            SessionAction::Begin { reply } => {
                let _ = reply.send(self.begin().await);
            }
            SessionAction::Answer { question_id, text } => {
                if let Err(e) = self.answer(question_id, text) {
                    warn!(question_id = %question_id, error = %e, "Answer not recorded");
                }
            }
            SessionAction::SelectSection(index) => {
                if let Err(e) = self.select_section(index).await {
                    warn!(section = index, error = %e, "Section change rejected");
                }
            }
            SessionAction::SetPage { section, page } => {
                if let Err(e) = self.set_page(section, page).await {
                    warn!(section, page, error = %e, "Page change rejected");
                }
            }
            SessionAction::Submit { reply } => {
                let _ = reply.send(self.request_submit().await);
            }
            SessionAction::ConnectivityChanged(online) => {
                self.connectivity_changed(online).await;
            }
            SessionAction::Reconcile => {
                if let Err(e) = self.reconcile().await {
                    warn!(error = %e, "Reconciliation incomplete");
                }
            }
        }
    }

    /// Main event loop
    ///
    /// Runs until `cancel` fires, every handle is gone, or the attempt
    /// finishes. Edits still inside their debounce window are queued durably
    /// before returning.
    pub async fn run(
        mut self,
        mut actions: mpsc::UnboundedReceiver<SessionAction>,
        cancel: CancellationToken,
    ) {
        info!(
            test_id = %self.test_id,
            tick_ms = self.settings.tick_interval.as_millis() as u64,
            reconcile_secs = self.settings.reconcile_interval.as_secs(),
            debounce_ms = self.settings.answer_debounce.as_millis() as u64,
            "Session controller starting"
        );

        let mut tick_timer = timer(self.settings.tick_interval, MissedTickBehavior::Burst);
        let mut reconcile_timer = timer(self.settings.reconcile_interval, MissedTickBehavior::Delay);
        let mut poll_timer = timer(self.settings.debounce_poll, MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Session controller cancelled");
                    break;
                }

                action = actions.recv() => {
                    match action {
                        Some(action) => self.handle_action(action).await,
                        None => {
                            info!("Action channel closed, session controller shutting down");
                            break;
                        }
                    }
                }

                _ = tick_timer.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "Countdown tick failed");
                    }
                }

                _ = reconcile_timer.tick() => {
                    if let Err(e) = self.reconcile().await {
                        warn!(error = %e, "Reconciliation incomplete");
                    }
                }

                _ = poll_timer.tick() => {
                    self.flush_settled_answers().await;
                }
            }

            if self.finished {
                info!("Attempt finished, session controller stopping");
                break;
            }
        }

        if !self.finished && !self.debounce.is_empty() {
            info!(
                count = self.debounce.pending_count(),
                "Queuing unsettled answers before shutdown"
            );
            self.flush_all_answers().await;
        }
    }

    /// Moves the controller onto a task and returns its handle
    ///
    /// Connectivity transitions are forwarded to the task as actions for as
    /// long as the handle lives.
    pub fn spawn(self) -> ControllerHandle {
        let (actions, rx) = mpsc::unbounded_channel();
        let view = self.view_tx.subscribe();
        let cancel = CancellationToken::new();

        let forward = actions.clone();
        let subscription = self.deps.connectivity.subscribe(move |online| {
            // A closed channel means the controller already stopped
            let _ = forward.send(SessionAction::ConnectivityChanged(online));
        });

        let task = tokio::spawn(self.run(rx, cancel.clone()));

        ControllerHandle {
            actions,
            view,
            cancel,
            task: Some(task),
            _connectivity: subscription,
        }
    }
}

/// An interval whose first tick is one period from now
fn timer(period: Duration, behavior: MissedTickBehavior) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(behavior);
    interval
}

// ============================================================================
// Actions and handle
// ============================================================================

/// Requests the UI sends to a running controller
#[derive(Debug)]
pub enum SessionAction {
    Resume {
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    Begin {
        reply: oneshot::Sender<Result<SessionId, SessionError>>,
    },
    Answer {
        question_id: QuestionId,
        text: String,
    },
    SelectSection(usize),
    SetPage {
        section: usize,
        page: u32,
    },
    Submit {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    ConnectivityChanged(bool),
    Reconcile,
}

/// Handle to a spawned [`TestSessionController`]
///
/// Dropping the handle stops the controller and its timers.
pub struct ControllerHandle {
    actions: mpsc::UnboundedSender<SessionAction>,
    view: watch::Receiver<SessionView>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    _connectivity: Subscription,
}

impl ControllerHandle {
    pub async fn resume(&self) -> Result<bool, SessionError> {
        self.request(|reply| SessionAction::Resume { reply }).await
    }

    pub async fn begin(&self) -> Result<SessionId, SessionError> {
        self.request(|reply| SessionAction::Begin { reply }).await
    }

    pub async fn submit(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionAction::Submit { reply }).await
    }

    pub fn answer(&self, question_id: QuestionId, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionAction::Answer {
            question_id,
            text: text.into(),
        })
    }

    pub fn select_section(&self, index: usize) -> Result<(), SessionError> {
        self.send(SessionAction::SelectSection(index))
    }

    pub fn set_page(&self, section: usize, page: u32) -> Result<(), SessionError> {
        self.send(SessionAction::SetPage { section, page })
    }

    pub fn reconcile(&self) -> Result<(), SessionError> {
        self.send(SessionAction::Reconcile)
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every view change
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the controller and waits for it to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Session controller task failed");
            }
        }
    }

    fn send(&self, action: SessionAction) -> Result<(), SessionError> {
        self.actions
            .send(action)
            .map_err(|_| SessionError::ControllerStopped)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, SessionError>>) -> SessionAction,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| SessionError::ControllerStopped)?
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
