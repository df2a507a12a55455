//! Run lifecycle against the automation server.
//!
//! The controller owns one [`RunInner`] behind a mutex that is never held
//! across an await. Every state change that invalidates outstanding work
//! (start, stop, teardown) bumps `generation`; a response carrying an older
//! generation is discarded when it arrives.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rpa_console_checks::{all_pass, outstanding};
use rpa_console_client::{ClientError, RpaClient};
use rpa_console_contract::{LogEntry, RemoteStatus, render_status};
use rpa_console_core::{CheckItem, CheckKey, RunMode, RunPhase};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::periodic::{PeriodicTask, TickFlow};
use crate::redact_sensitive;

/// Default status poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);

/// Smallest poll interval accepted.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Controller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunControllerConfig {
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Consecutive failed polls after which the run is marked as errored.
    /// `None` keeps polling indefinitely.
    pub stale_after_polls: Option<u32>,
}

impl Default for RunControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stale_after_polls: None,
        }
    }
}

/// Why a start request was refused locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartRejected {
    /// Not every prerequisite passes.
    #[error("setup incomplete: {}", join_keys(.0))]
    ValidationIncomplete(Vec<CheckKey>),
    /// No signed-in user.
    #[error("sign-in required")]
    Unauthenticated,
    /// A run is already starting or running.
    #[error("a run is already active")]
    AlreadyActive,
}

fn join_keys(keys: &[CheckKey]) -> String {
    keys.iter()
        .map(|key| key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a stop or log request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunRequestError {
    /// Server answered with `success: false`.
    #[error("server reported failure: {0}")]
    Server(String),
    /// Transport or decode failure.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Point-in-time copy of the run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    /// Lifecycle phase.
    pub phase: RunPhase,
    /// User the run belongs to.
    pub user_id: Option<String>,
    /// Local start time.
    pub started_at: Option<DateTime<Utc>>,
    /// Latest status line.
    pub status_text: String,
    /// Latest error message from the server or transport.
    pub last_error: Option<String>,
    /// Whether a poll timer is active.
    pub polling: bool,
}

/// One page of job logs in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPage {
    /// Total lines held by the server.
    pub total_logs: u64,
    /// Returned lines.
    pub logs: Vec<LogEntry>,
}

#[derive(Debug)]
struct RunInner {
    phase: RunPhase,
    user_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    status_text: String,
    last_error: Option<String>,
    generation: u64,
    poll: Option<PeriodicTask>,
    failed_polls: u32,
}

impl RunInner {
    fn idle() -> Self {
        Self {
            phase: RunPhase::Idle,
            user_id: None,
            started_at: None,
            status_text: String::new(),
            last_error: None,
            generation: 0,
            poll: None,
            failed_polls: 0,
        }
    }

    fn invalidate(&mut self) -> u64 {
        self.poll = None;
        self.failed_polls = 0;
        self.generation += 1;
        self.generation
    }

    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            phase: self.phase,
            user_id: self.user_id.clone(),
            started_at: self.started_at,
            status_text: self.status_text.clone(),
            last_error: self.last_error.clone(),
            polling: self.poll.is_some(),
        }
    }
}

fn lock(inner: &Mutex<RunInner>) -> MutexGuard<'_, RunInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives start, status polling, stop and log retrieval for one session.
pub struct RunController {
    client: RpaClient,
    config: RunControllerConfig,
    inner: Arc<Mutex<RunInner>>,
}

impl RunController {
    /// Creates an idle controller.
    pub fn new(client: RpaClient, config: RunControllerConfig) -> Self {
        Self {
            client,
            config: RunControllerConfig {
                poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
                ..config
            },
            inner: Arc::new(Mutex::new(RunInner::idle())),
        }
    }

    /// Current state copy.
    pub fn snapshot(&self) -> RunSnapshot {
        lock(&self.inner).snapshot()
    }

    /// Current phase.
    pub fn phase(&self) -> RunPhase {
        lock(&self.inner).phase
    }

    /// Returns `true` while a poll timer is active.
    pub fn is_polling(&self) -> bool {
        lock(&self.inner).poll.is_some()
    }

    /// Starts the remote job for `user_id`.
    ///
    /// The request is only sent when every check passes, a user is bound and
    /// no run is active. A refused or failed start issues no poll.
    ///
    /// # Errors
    /// Returns [`StartRejected`] when the start is refused locally; server and
    /// transport failures are reported through the returned snapshot's
    /// `Error` phase instead.
    pub async fn start(
        &self,
        user_id: Option<&str>,
        checks: &[CheckItem],
        mode: Option<RunMode>,
    ) -> Result<RunSnapshot, StartRejected> {
        if !all_pass(checks) {
            return Err(StartRejected::ValidationIncomplete(outstanding(checks)));
        }
        let user_id = user_id
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .ok_or(StartRejected::Unauthenticated)?
            .to_string();

        let generation = {
            let mut state = lock(&self.inner);
            if state.phase.is_active() {
                return Err(StartRejected::AlreadyActive);
            }
            let generation = state.invalidate();
            state.phase = RunPhase::Starting;
            state.user_id = Some(user_id.clone());
            state.started_at = None;
            state.last_error = None;
            state.status_text = "Starting".to_string();
            generation
        };
        info!(stage = "run", action = "start", user_id = %user_id, "start requested");

        let result = self.client.start(&user_id, mode).await;

        let mut state = lock(&self.inner);
        if state.generation != generation {
            debug!(stage = "run", action = "start", "start reply discarded");
            return Ok(state.snapshot());
        }
        match result {
            Ok(reply) if reply.success => {
                state.phase = RunPhase::Running;
                state.started_at = Some(Utc::now());
                state.status_text = "Running".to_string();
                state.poll = Some(self.spawn_poller(user_id, generation));
                info!(stage = "run", action = "start", "run started");
            }
            Ok(reply) => {
                let message = reply.error_message();
                warn!(stage = "run", action = "start", error = %redact_sensitive(&message), "start refused by server");
                state.phase = RunPhase::Error;
                state.status_text = format!("Start failed: {message}");
                state.last_error = Some(message);
            }
            Err(error) => {
                let message = error.to_string();
                warn!(stage = "run", action = "start", error = %redact_sensitive(&message), "start request failed");
                state.phase = RunPhase::Error;
                state.status_text = format!("Start failed: {message}");
                state.last_error = Some(message);
            }
        }
        Ok(state.snapshot())
    }

    /// Ensures a poll timer runs while the phase is `Running`.
    ///
    /// # Returns
    /// `true` when a timer is active after the call.
    pub fn start_polling(&self) -> bool {
        let mut state = lock(&self.inner);
        if state.phase != RunPhase::Running {
            return false;
        }
        if state.poll.is_none() {
            let Some(user_id) = state.user_id.clone() else {
                return false;
            };
            let generation = state.generation;
            state.poll = Some(self.spawn_poller(user_id, generation));
        }
        true
    }

    /// Cancels the poll timer. A running controller becomes `Stopped`.
    pub fn stop_polling(&self) {
        let mut state = lock(&self.inner);
        state.invalidate();
        if state.phase == RunPhase::Running {
            state.phase = RunPhase::Stopped;
        }
    }

    /// Cancels everything and returns to `Idle`; later replies are dropped.
    pub fn teardown(&self) {
        let mut state = lock(&self.inner);
        let generation = state.invalidate();
        *state = RunInner {
            generation,
            ..RunInner::idle()
        };
        debug!(stage = "run", action = "teardown", "controller reset");
    }

    /// Asks the server to stop the job.
    ///
    /// On success polling ends, the phase becomes `Stopped` and the elapsed
    /// whole seconds since the local start are returned when known.
    ///
    /// A reply that arrives after a teardown or a new start is not applied.
    ///
    /// # Errors
    /// Returns [`RunRequestError`] and leaves the run untouched on failure.
    pub async fn stop_run(&self, user_id: &str) -> Result<Option<i64>, RunRequestError> {
        let generation = lock(&self.inner).generation;
        let reply = self.client.stop(user_id).await?;
        if !reply.success {
            return Err(RunRequestError::Server(reply.error_message()));
        }

        let mut state = lock(&self.inner);
        if state.generation != generation {
            debug!(stage = "run", action = "stop", "stop reply discarded");
            return Ok(None);
        }
        state.invalidate();
        state.phase = RunPhase::Stopped;
        state.status_text = "Stopped".to_string();
        let elapsed = state
            .started_at
            .take()
            .map(|started_at| (Utc::now() - started_at).num_seconds().max(0));
        info!(stage = "run", action = "stop", "run stopped");
        Ok(elapsed)
    }

    /// Fetches up to `limit` log lines in server order.
    ///
    /// # Errors
    /// Returns [`RunRequestError`] on transport failures or `success: false`.
    pub async fn fetch_logs(&self, user_id: &str, limit: u32) -> Result<LogPage, RunRequestError> {
        let reply = self.client.logs(user_id, limit).await?;
        if !reply.success {
            return Err(RunRequestError::Server(
                reply.error.unwrap_or_else(|| rpa_console_contract::UNKNOWN_ERROR.to_string()),
            ));
        }
        Ok(LogPage {
            total_logs: reply.total_logs,
            logs: reply.logs,
        })
    }

    fn spawn_poller(&self, user_id: String, generation: u64) -> PeriodicTask {
        let client = self.client.clone();
        let inner = self.inner.clone();
        let stale_after = self.config.stale_after_polls;
        PeriodicTask::spawn(self.config.poll_interval, move || {
            let client = client.clone();
            let inner = inner.clone();
            let user_id = user_id.clone();
            async move { poll_once(&client, &inner, &user_id, generation, stale_after).await }
        })
    }
}

async fn poll_once(
    client: &RpaClient,
    inner: &Mutex<RunInner>,
    user_id: &str,
    generation: u64,
    stale_after: Option<u32>,
) -> TickFlow {
    let result = client.status(user_id).await;

    let mut state = lock(inner);
    if state.generation != generation {
        return TickFlow::Break;
    }

    let reply = match result {
        Ok(reply) if reply.success => reply,
        Ok(reply) => {
            let message = reply.error.unwrap_or_default();
            return record_failed_poll(&mut state, stale_after, &message);
        }
        Err(error) => return record_failed_poll(&mut state, stale_after, &error.to_string()),
    };

    state.failed_polls = 0;
    state.status_text = render_status(&reply);
    let terminal_phase = match reply.remote_status() {
        RemoteStatus::Completed | RemoteStatus::Stopped => RunPhase::Stopped,
        RemoteStatus::Error => {
            state.last_error = reply.error.clone();
            RunPhase::Error
        }
        _ => return TickFlow::Continue,
    };

    state.phase = terminal_phase;
    state.poll = None;
    info!(stage = "run", action = "poll", phase = terminal_phase.as_str(), "run finished");
    TickFlow::Break
}

fn record_failed_poll(state: &mut RunInner, stale_after: Option<u32>, message: &str) -> TickFlow {
    state.failed_polls += 1;
    debug!(
        stage = "run",
        action = "poll",
        failures = state.failed_polls,
        error = %redact_sensitive(message),
        "status poll failed"
    );
    match stale_after {
        Some(limit) if state.failed_polls >= limit => {
            warn!(stage = "run", action = "poll", "status unavailable; marking run as errored");
            state.phase = RunPhase::Error;
            state.status_text = "Status unavailable".to_string();
            state.last_error = Some(format!("no status after {limit} attempts"));
            state.poll = None;
            TickFlow::Break
        }
        _ => TickFlow::Continue,
    }
}
