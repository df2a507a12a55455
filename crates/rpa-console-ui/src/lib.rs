#![warn(missing_docs)]
//! # rpa-console-ui
//!
//! ## Purpose
//! Defines the view-facing state model of the console.
//!
//! ## Responsibilities
//! - Hold the check list, run projection, route and SMS history.
//! - Gate the start action on auth, checks and run phase.
//! - Render checks and banners into display text.
//!
//! ## Data flow
//! Console service events mutate [`ConsoleView`], which the CLI (or any other
//! shell) renders.
//!
//! ## Ownership and lifetimes
//! The view owns all strings so reducers never borrow from service state.
//!
//! ## Error model
//! Favors explicit state over recoverable errors; failures become status text.
//!
//! ## Security and privacy notes
//! View state excludes credentials; SMS history keeps only a message preview.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rpa_console_checks::{all_pass, failed_checks, outstanding, pending_checks};
use rpa_console_core::{CheckItem, CheckStatus, RunPhase};

/// Newest SMS history entries kept.
pub const SMS_HISTORY_CAPACITY: usize = 100;

/// Characters of an SMS message kept in the history preview.
pub const SMS_PREVIEW_CHARS: usize = 50;

/// UI-auth state projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAuthState {
    /// User is not authenticated.
    Unauthenticated,
    /// Valid authenticated session.
    Authenticated,
    /// Session expired and requires reauth.
    ReauthRequired,
}

/// Screen the shell should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Launch screen with checks and run status.
    Rpa,
    /// Personal-info history.
    History,
    /// Sign-in screen.
    Login,
}

/// Outcome class of one SMS send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsDeliveryStatus {
    /// Gateway accepted the message.
    Success,
    /// Gateway rejected the message.
    Failed,
    /// Request never completed.
    Error,
}

impl SmsDeliveryStatus {
    /// Uppercase label.
    pub fn label(self) -> &'static str {
        match self {
            SmsDeliveryStatus::Success => "SUCCESS",
            SmsDeliveryStatus::Failed => "FAILED",
            SmsDeliveryStatus::Error => "ERROR",
        }
    }
}

/// One SMS history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsHistoryEntry {
    /// Send time.
    pub timestamp: DateTime<Utc>,
    /// Recipient number.
    pub phone: String,
    /// Truncated message text.
    pub preview: String,
    /// Outcome.
    pub status: SmsDeliveryStatus,
    /// Gateway detail line.
    pub status_info: Option<String>,
}

/// Bounded newest-first SMS history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmsHistory {
    entries: VecDeque<SmsHistoryEntry>,
}

impl SmsHistory {
    /// Records a send at the front, evicting the oldest beyond capacity.
    pub fn record(
        &mut self,
        timestamp: DateTime<Utc>,
        phone: &str,
        message: &str,
        status: SmsDeliveryStatus,
        status_info: Option<String>,
    ) {
        self.entries.push_front(SmsHistoryEntry {
            timestamp,
            phone: phone.to_string(),
            preview: preview(message),
            status,
            status_info,
        });
        self.entries.truncate(SMS_HISTORY_CAPACITY);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &SmsHistoryEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing was sent yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Truncates `message` to the preview length, appending `...` when cut.
pub fn preview(message: &str) -> String {
    let mut chars = message.chars();
    let head: String = chars.by_ref().take(SMS_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Aggregate console view state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleView {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Current auth status.
    pub auth: UiAuthState,
    /// Current screen.
    pub route: Route,
    /// Latest check results, always eight entries.
    pub checks: Vec<CheckItem>,
    /// Whether a check refresh is in flight.
    pub checks_loading: bool,
    /// Last server connection indicator, `None` before the first probe.
    pub server_connected: Option<bool>,
    /// Local run phase.
    pub run_phase: RunPhase,
    /// Human-readable run status.
    pub status_text: String,
    /// Start time of the current run.
    pub started_at: Option<DateTime<Utc>>,
    /// SMS send history.
    pub sms_history: SmsHistory,
}

impl ConsoleView {
    /// Creates the initial view: pending checks, idle run.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            auth: UiAuthState::Unauthenticated,
            route: Route::Rpa,
            checks: pending_checks(),
            checks_loading: false,
            server_connected: None,
            run_phase: RunPhase::Idle,
            status_text: String::new(),
            started_at: None,
            sms_history: SmsHistory::default(),
        }
    }

    /// Returns `true` when the start action may be offered.
    pub fn start_enabled(&self) -> bool {
        self.auth == UiAuthState::Authenticated
            && !self.checks_loading
            && !self.run_phase.is_active()
            && all_pass(&self.checks)
    }

    /// Applies an auth change; anything but an authenticated session routes
    /// to the sign-in screen.
    pub fn apply_auth(&mut self, auth: UiAuthState) {
        self.auth = auth;
        if auth != UiAuthState::Authenticated {
            self.route = Route::Login;
        } else if self.route == Route::Login {
            self.route = Route::Rpa;
        }
    }

    /// Marks a check refresh as in flight.
    pub fn begin_check_refresh(&mut self) {
        self.checks_loading = true;
    }

    /// Stores fresh check results.
    pub fn apply_checks(&mut self, checks: Vec<CheckItem>) {
        self.checks = checks;
        self.checks_loading = false;
    }

    /// Marks every check failed after the config could not be read.
    pub fn apply_check_failure(&mut self, message: &str) {
        self.checks = failed_checks();
        self.checks_loading = false;
        self.status_text = format!("Configuration check failed: {message}");
    }

    /// Mirrors the run controller's projection.
    pub fn apply_run(
        &mut self,
        phase: RunPhase,
        status_text: impl Into<String>,
        started_at: Option<DateTime<Utc>>,
    ) {
        self.run_phase = phase;
        self.status_text = status_text.into();
        self.started_at = started_at;
    }

    /// Switches screens.
    pub fn route_to(&mut self, route: Route) {
        self.route = route;
    }

    /// Banner listing unmet prerequisites, `None` when all pass.
    pub fn incomplete_banner(&self) -> Option<String> {
        if all_pass(&self.checks) {
            return None;
        }
        let missing: Vec<&str> = outstanding(&self.checks)
            .into_iter()
            .map(|key| key.label())
            .collect();
        Some(format!("Setup incomplete: {}", missing.join(", ")))
    }

    /// One display line per check.
    pub fn render_checks(&self) -> Vec<String> {
        self.checks.iter().map(render_check).collect()
    }
}

fn render_check(item: &CheckItem) -> String {
    let icon = match item.pass {
        CheckStatus::Pass => "[ok]",
        CheckStatus::Fail => "[x]",
        CheckStatus::Unknown => "[..]",
    };
    if item.pass == CheckStatus::Fail && !item.hint.is_empty() {
        format!("{icon} {} - {}", item.label, item.hint)
    } else {
        format!("{icon} {}", item.label)
    }
}
