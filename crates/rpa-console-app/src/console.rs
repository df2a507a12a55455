//! Per-session console service.
//!
//! [`Console`] composes the config store, the server client, the identity
//! provider and the run controller, and keeps the [`ConsoleView`] in step
//! with them. One instance exists per signed-in session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rpa_console_auth::{AuthState, AuthStateMachine, IdentityProvider, UserIdentity};
use rpa_console_checks::{all_pass, validate};
use rpa_console_client::RpaClient;
use rpa_console_contract::{UNKNOWN_ERROR, render_status};
use rpa_console_core::{CheckItem, RpaConfig, RunMode, RunPhase, TemplateSlot, UserConfig};
use rpa_console_store::{ConfigStoreClient, EmailSettings, SmsSettings};
use rpa_console_ui::{ConsoleView, Route, SmsDeliveryStatus, UiAuthState};
use serde_json::Value;
use tracing::{info, warn};

use crate::health::{probe_within, spawn_health_monitor};
use crate::periodic::PeriodicTask;
use crate::run_controller::{
    LogPage, RunController, RunControllerConfig, RunSnapshot, StartRejected,
};
use crate::{AppError, redact_sensitive};

/// Collaborators and tuning for one [`Console`].
pub struct ConsoleParts {
    /// App version shown in the view.
    pub version: String,
    /// Config record access.
    pub store: ConfigStoreClient,
    /// Server client.
    pub client: RpaClient,
    /// Identity provider.
    pub identity: Arc<dyn IdentityProvider>,
    /// Run controller tuning.
    pub controller: RunControllerConfig,
    /// Health probe timeout.
    pub health_timeout: Duration,
    /// Log lines requested per fetch.
    pub log_limit: u32,
}

/// Console session service.
pub struct Console {
    store: ConfigStoreClient,
    client: RpaClient,
    identity: Arc<dyn IdentityProvider>,
    auth: Mutex<AuthStateMachine>,
    controller: RunController,
    view: Arc<Mutex<ConsoleView>>,
    health_timeout: Duration,
    log_limit: u32,
    health_monitor: Mutex<Option<PeriodicTask>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

impl Console {
    /// Builds a console in the initial view state.
    pub fn new(parts: ConsoleParts) -> Self {
        Self {
            controller: RunController::new(parts.client.clone(), parts.controller),
            store: parts.store,
            client: parts.client,
            identity: parts.identity,
            auth: Mutex::new(AuthStateMachine::new()),
            view: Arc::new(Mutex::new(ConsoleView::new(parts.version))),
            health_timeout: parts.health_timeout,
            log_limit: parts.log_limit,
            health_monitor: Mutex::new(None),
        }
    }

    /// Run controller.
    pub fn controller(&self) -> &RunController {
        &self.controller
    }

    /// View copy with the latest run state folded in.
    pub fn view(&self) -> ConsoleView {
        let run = self.controller.snapshot();
        let mut view = lock(&self.view);
        if run.phase == RunPhase::Idle && run.status_text.is_empty() {
            view.run_phase = RunPhase::Idle;
            view.started_at = None;
        } else {
            view.apply_run(run.phase, run.status_text, run.started_at);
        }
        view.clone()
    }

    /// Re-reads the provider session and returns the bound identity.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`] when the provider fails.
    pub fn sync_auth(&self) -> Result<Option<UserIdentity>, AppError> {
        let session = self.identity.current_session()?;
        let now = now_ms();
        let mut auth = lock(&self.auth);
        match session {
            Some(session) => auth.on_sign_in(session),
            None => auth.sign_out(),
        }
        auth.on_tick(now);
        let ui_state = match auth.state() {
            AuthState::Authenticated(_) => UiAuthState::Authenticated,
            AuthState::ReauthRequired => UiAuthState::ReauthRequired,
            AuthState::Unauthenticated => UiAuthState::Unauthenticated,
        };
        lock(&self.view).apply_auth(ui_state);
        Ok(auth.bound_identity(now).cloned())
    }

    fn require_identity(&self) -> Result<UserIdentity, AppError> {
        self.sync_auth()?.ok_or(AppError::Unauthenticated)
    }

    /// Loads (or creates) the record and re-evaluates all eight checks.
    ///
    /// A record that cannot be read marks every check failed.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthenticated`] without a signed-in user.
    pub async fn refresh_checks(&self) -> Result<Vec<CheckItem>, AppError> {
        let identity = self.require_identity()?;
        lock(&self.view).begin_check_refresh();

        let record = match self.store.get_or_create(&identity, Utc::now()) {
            Ok(record) => record,
            Err(error) => {
                let message = redact_sensitive(&error.to_string());
                warn!(stage = "checks", action = "load_config", error = %message, "config read failed");
                let mut view = lock(&self.view);
                view.apply_check_failure(&message);
                return Ok(view.checks.clone());
            }
        };

        let healthy = probe_within(&self.client, self.health_timeout).await;
        let checks = validate(&record, healthy);
        info!(
            stage = "checks",
            action = "validate",
            all_pass = all_pass(&checks),
            server = healthy,
            "checks refreshed"
        );
        let mut view = lock(&self.view);
        view.server_connected = Some(healthy);
        view.apply_checks(checks.clone());
        Ok(checks)
    }

    /// Starts a run using the latest check results.
    ///
    /// # Errors
    /// Returns [`StartRejected`] when refused locally; an unauthenticated
    /// session also routes the view to the sign-in screen.
    pub async fn start(&self, mode: Option<RunMode>) -> Result<RunSnapshot, StartRejected> {
        let identity = self.sync_auth().ok().flatten();
        let checks = lock(&self.view).checks.clone();
        let result = self
            .controller
            .start(identity.as_ref().map(|identity| identity.uid.as_str()), &checks, mode)
            .await;
        if matches!(result, Err(StartRejected::Unauthenticated)) {
            lock(&self.view).route_to(Route::Login);
        }
        result
    }

    /// Reads the server status once and renders it.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthenticated`], transport errors, or
    /// [`AppError::Server`] for `success: false`.
    pub async fn status_line(&self) -> Result<String, AppError> {
        let identity = self.require_identity()?;
        let reply = self.client.status(&identity.uid).await?;
        if !reply.success {
            return Err(AppError::Server(
                reply.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            ));
        }
        Ok(render_status(&reply))
    }

    /// Stops the current user's run; returns elapsed seconds when known.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthenticated`] or the stop failure.
    pub async fn stop(&self) -> Result<Option<i64>, AppError> {
        let identity = self.require_identity()?;
        Ok(self.controller.stop_run(&identity.uid).await?)
    }

    /// Fetches the configured number of log lines.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthenticated`] or the fetch failure.
    pub async fn logs(&self) -> Result<LogPage, AppError> {
        let identity = self.require_identity()?;
        Ok(self
            .controller
            .fetch_logs(&identity.uid, self.log_limit)
            .await?)
    }

    /// Runs the personal-info extraction.
    ///
    /// On success the results are forwarded to the history endpoint before the
    /// view moves to the history screen; a failed history write is only logged.
    ///
    /// # Errors
    /// Returns [`AppError::Server`] for `success: false` and transport errors
    /// as [`AppError::Client`].
    pub async fn fetch_personal_info(&self) -> Result<Vec<Value>, AppError> {
        let identity = self.require_identity()?;
        let reply = self.client.personal_info(&identity.uid).await?;
        if !reply.success {
            return Err(AppError::Server(
                reply.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            ));
        }
        let results = reply.into_results();

        if let Err(error) = self.client.post_history(&identity.uid, results.clone()).await {
            warn!(stage = "personal_info", action = "history", error = %error, "history save failed");
        }

        lock(&self.view).route_to(Route::History);
        info!(stage = "personal_info", action = "fetch", count = results.len(), "personal info fetched");
        Ok(results)
    }

    /// Sends one SMS and records the outcome in the view history.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthenticated`] only; delivery failures are
    /// reported through the returned status and the history entry.
    pub async fn send_sms(
        &self,
        phone: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<SmsDeliveryStatus, AppError> {
        let identity = self.require_identity()?;
        let (status, info) = match self.client.send_sms(&identity.uid, phone, message).await {
            Ok(reply) if reply.success => (
                SmsDeliveryStatus::Success,
                format!("Status: {}", reply.gateway_status()),
            ),
            Ok(reply) => {
                let error = reply.error.clone().unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                (
                    SmsDeliveryStatus::Failed,
                    format!("Status: {} - {error}", reply.gateway_status()),
                )
            }
            Err(error) => (
                SmsDeliveryStatus::Error,
                format!("Connection error: {error}"),
            ),
        };
        info!(stage = "sms", action = "send", status = status.label(), "sms send finished");
        lock(&self.view)
            .sms_history
            .record(now, phone, message, status, Some(info));
        Ok(status)
    }

    /// Resolves the SMS text: a stored template wins over `message`.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidInput`] when the chosen template is empty or
    /// neither source is given, and store failures when reading the template.
    pub fn sms_message(
        &self,
        template: Option<TemplateSlot>,
        message: Option<String>,
    ) -> Result<String, AppError> {
        match (template, message) {
            (Some(slot), _) => self
                .template(slot)?
                .filter(|text| !text.trim().is_empty())
                .ok_or_else(|| AppError::InvalidInput(format!("template {slot:?} is empty"))),
            (None, Some(message)) if !message.trim().is_empty() => Ok(message),
            (None, _) => Err(AppError::InvalidInput(
                "message text or a template is required".to_string(),
            )),
        }
    }

    /// Current record for the signed-in user.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthenticated`] or store failures.
    pub fn config(&self) -> Result<UserConfig, AppError> {
        let identity = self.require_identity()?;
        Ok(self.store.get_or_create(&identity, Utc::now())?)
    }

    /// Flat launch view of the current record.
    ///
    /// # Errors
    /// Same as [`Console::config`].
    pub fn rpa_config(&self) -> Result<RpaConfig, AppError> {
        Ok(self.config()?.rpa_config())
    }

    /// Stored SMS template text.
    ///
    /// # Errors
    /// Same as [`Console::config`].
    pub fn template(&self, slot: TemplateSlot) -> Result<Option<String>, AppError> {
        Ok(self.config()?.template(slot).map(str::to_string))
    }

    /// Saves the email section.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthenticated`] or store failures.
    pub fn update_email_settings(&self, settings: EmailSettings) -> Result<UserConfig, AppError> {
        let identity = self.require_identity()?;
        Ok(self
            .store
            .update_email_config(&identity, settings, Utc::now())?)
    }

    /// Saves the SMS section.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthenticated`] or store failures.
    pub fn update_sms_settings(&self, settings: SmsSettings) -> Result<UserConfig, AppError> {
        let identity = self.require_identity()?;
        Ok(self.store.update_sms_config(&identity, settings, Utc::now())?)
    }

    /// Starts the periodic connection indicator; replaces a running one.
    pub fn start_health_monitor(&self, period: Duration) {
        let view = self.view.clone();
        let task = spawn_health_monitor(
            self.client.clone(),
            period,
            self.health_timeout,
            move |healthy| lock(&view).server_connected = Some(healthy),
        );
        *lock(&self.health_monitor) = Some(task);
    }

    /// Stops the connection indicator.
    pub fn stop_health_monitor(&self) {
        lock(&self.health_monitor).take();
    }

    /// Cancels background work and resets the run; the session stays.
    pub fn teardown(&self) {
        self.stop_health_monitor();
        self.controller.teardown();
    }

    /// Ends the session and routes to the sign-in screen.
    ///
    /// # Errors
    /// Returns [`AppError::Auth`] when the provider rejects the sign-out; local
    /// state is reset regardless.
    pub fn logout(&self) -> Result<(), AppError> {
        self.teardown();
        lock(&self.auth).sign_out();
        lock(&self.view).apply_auth(UiAuthState::Unauthenticated);
        self.identity.sign_out()?;
        Ok(())
    }
}
