#![warn(missing_docs)]
//! # rpa-console-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `rpa-console` workspace.
//!
//! ## Responsibilities
//! - Represent the per-user configuration record and its email/SMS sections.
//! - Name the eight launch prerequisites and their tri-state check results.
//! - Describe the run modes accepted by the automation server and the local
//!   run lifecycle phases.
//! - Detect the SMS provider family from a gateway URL.
//!
//! ## Data flow
//! A config store materializes [`UserConfig`] records. The validator reads
//! them and emits [`CheckItem`] lists, which gate the run controller.
//!
//! ## Ownership and lifetimes
//! Records own their strings so they can cross async task boundaries without
//! borrowing from store buffers.
//!
//! ## Error model
//! Invalid identifiers, out-of-range run intervals and codec failures return
//! [`CoreError`] variants.
//!
//! ## Security and privacy notes
//! `UserConfig` holds plaintext passwords. Its `Debug` output masks every
//! secret field, so records are safe to pass to `tracing` fields.
//!
//! ## Example
//! ```rust
//! use rpa_console_core::{CheckKey, UserConfig};
//!
//! let record = UserConfig::new_default("uid-1", "user@example.com", chrono::Utc::now());
//! assert!(record.email_config.address.is_empty());
//! assert_eq!(CheckKey::ALL.len(), 8);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collection name under which configuration records are keyed.
pub const USER_CONFIG_COLLECTION: &str = "user_configs";

/// Default continuous-mode interval in seconds.
pub const DEFAULT_RUN_INTERVAL_SECS: u32 = 5;

/// Largest continuous-mode interval the server accepts.
pub const MAX_RUN_INTERVAL_SECS: u32 = 3_600;

/// Mailbox credentials consumed by the automation job.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Login address; also the mailbox the job reads.
    #[serde(default)]
    pub address: String,
    /// Mail provider application password (16 alphanumerics once spaces are removed).
    #[serde(default)]
    pub app_password: String,
    /// Password for the target site login.
    #[serde(default)]
    pub site_password: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("address", &self.address)
            .field("app_password", &mask(&self.app_password))
            .field("site_password", &mask(&self.site_password))
            .finish()
    }
}

/// SMS gateway credentials and message templates.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Provider family detected from `api_url`.
    #[serde(default)]
    pub provider: String,
    /// Gateway endpoint URL. Shape is not enforced.
    #[serde(default)]
    pub api_url: String,
    /// Gateway account id.
    #[serde(default)]
    pub api_id: String,
    /// Gateway account password.
    #[serde(default)]
    pub api_password: String,
    /// Message template A.
    #[serde(default)]
    pub sms_text_a: String,
    /// Message template B.
    #[serde(default)]
    pub sms_text_b: String,
    /// Whether delivery reports are requested from the gateway.
    #[serde(default)]
    pub use_delivery_report: bool,
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_id", &self.api_id)
            .field("api_password", &mask(&self.api_password))
            .field("sms_text_a", &self.sms_text_a)
            .field("sms_text_b", &self.sms_text_b)
            .field("use_delivery_report", &self.use_delivery_report)
            .finish()
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { "<redacted>" }
}

/// One configuration record per authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Owning user id.
    pub user_id: String,
    /// Account email reported by the identity provider.
    #[serde(default)]
    pub email: String,
    /// Mailbox credentials.
    #[serde(default)]
    pub email_config: EmailConfig,
    /// SMS gateway settings.
    #[serde(default)]
    pub sms_config: SmsConfig,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl UserConfig {
    /// Builds the empty record created on a user's first read.
    pub fn new_default(user_id: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            email_config: EmailConfig::default(),
            sms_config: SmsConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Flattened view consumed by launch tooling.
    pub fn rpa_config(&self) -> RpaConfig {
        RpaConfig {
            email: self.email_config.address.clone(),
            email_password: self.email_config.app_password.clone(),
            site_password: self.email_config.site_password.clone(),
            sms_provider: self.sms_config.provider.clone(),
            sms_api_url: self.sms_config.api_url.clone(),
            sms_api_id: self.sms_config.api_id.clone(),
            sms_api_password: self.sms_config.api_password.clone(),
            sms_text_a: self.sms_config.sms_text_a.clone(),
            sms_text_b: self.sms_config.sms_text_b.clone(),
        }
    }

    /// Returns the requested message template, if set.
    pub fn template(&self, slot: TemplateSlot) -> Option<&str> {
        let text = match slot {
            TemplateSlot::A => self.sms_config.sms_text_a.as_str(),
            TemplateSlot::B => self.sms_config.sms_text_b.as_str(),
        };
        (!text.trim().is_empty()).then_some(text)
    }

    /// Serializes the record to pretty-printed JSON bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec_pretty(self).map_err(CoreError::Codec)
    }

    /// Deserializes a record from JSON bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON decoding fails.
    pub fn from_json_bytes(raw: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(raw).map_err(CoreError::Codec)
    }
}

/// Flat projection of a [`UserConfig`] in launch-oriented naming.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpaConfig {
    /// Mailbox address.
    pub email: String,
    /// Application password.
    pub email_password: String,
    /// Target site password.
    pub site_password: String,
    /// Detected SMS provider.
    pub sms_provider: String,
    /// SMS gateway URL.
    pub sms_api_url: String,
    /// SMS gateway id.
    pub sms_api_id: String,
    /// SMS gateway password.
    pub sms_api_password: String,
    /// Template A.
    pub sms_text_a: String,
    /// Template B.
    pub sms_text_b: String,
}

impl fmt::Debug for RpaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpaConfig")
            .field("email", &self.email)
            .field("sms_provider", &self.sms_provider)
            .field("sms_api_url", &self.sms_api_url)
            .finish_non_exhaustive()
    }
}

/// Message template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSlot {
    /// First template.
    A,
    /// Second template.
    B,
}

/// Returns the storage key for one user's record.
///
/// # Errors
/// Returns [`CoreError::InvalidUserId`] when the id is blank or contains a
/// path separator.
pub fn record_key(user_id: &str) -> Result<String, CoreError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        return Err(CoreError::InvalidUserId(user_id.to_string()));
    }
    Ok(format!("{USER_CONFIG_COLLECTION}/{trimmed}"))
}

/// SMS provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsProvider {
    /// `sms-console.jp`.
    SmsConsole,
    /// Twilio.
    Twilio,
    /// Vonage / Nexmo.
    Vonage,
    /// MessageBird.
    MessageBird,
    /// Plivo.
    Plivo,
    /// Anything else.
    Custom,
}

impl SmsProvider {
    /// Stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            SmsProvider::SmsConsole => "sms-console",
            SmsProvider::Twilio => "twilio",
            SmsProvider::Vonage => "vonage",
            SmsProvider::MessageBird => "messagebird",
            SmsProvider::Plivo => "plivo",
            SmsProvider::Custom => "custom",
        }
    }
}

/// Detects the provider family by case-insensitive host substring.
pub fn detect_provider(api_url: &str) -> SmsProvider {
    let url = api_url.to_ascii_lowercase();
    if url.contains("sms-console.jp") {
        SmsProvider::SmsConsole
    } else if url.contains("twilio.com") {
        SmsProvider::Twilio
    } else if url.contains("vonage.com") || url.contains("nexmo.com") {
        SmsProvider::Vonage
    } else if url.contains("messagebird.com") {
        SmsProvider::MessageBird
    } else if url.contains("plivo.com") {
        SmsProvider::Plivo
    } else {
        SmsProvider::Custom
    }
}

/// Names of the eight launch prerequisites, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckKey {
    /// Mailbox address has a valid shape.
    EmailFormat,
    /// Mailbox the job reads is set.
    TargetMailbox,
    /// Application password is 16 alphanumerics.
    AppPwd,
    /// Site password is set.
    SitePwd,
    /// SMS gateway URL is set.
    ApiUrl,
    /// SMS gateway id is set.
    ApiId,
    /// SMS gateway password is set.
    ApiPwd,
    /// Automation server answered its liveness probe.
    Server,
}

impl CheckKey {
    /// Every key in stable display order.
    pub const ALL: [CheckKey; 8] = [
        CheckKey::EmailFormat,
        CheckKey::TargetMailbox,
        CheckKey::AppPwd,
        CheckKey::SitePwd,
        CheckKey::ApiUrl,
        CheckKey::ApiId,
        CheckKey::ApiPwd,
        CheckKey::Server,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            CheckKey::EmailFormat => "emailFormat",
            CheckKey::TargetMailbox => "targetMailbox",
            CheckKey::AppPwd => "appPwd",
            CheckKey::SitePwd => "sitePwd",
            CheckKey::ApiUrl => "apiUrl",
            CheckKey::ApiId => "apiId",
            CheckKey::ApiPwd => "apiPwd",
            CheckKey::Server => "server",
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            CheckKey::EmailFormat => "Email format",
            CheckKey::TargetMailbox => "Target mailbox",
            CheckKey::AppPwd => "Mail app password (16 chars)",
            CheckKey::SitePwd => "Site login password",
            CheckKey::ApiUrl => "SMS API URL",
            CheckKey::ApiId => "SMS API ID",
            CheckKey::ApiPwd => "SMS API password",
            CheckKey::Server => "Server link (/api/health)",
        }
    }

    /// Fixed hint shown while the check is not passing.
    pub fn failure_hint(self) -> &'static str {
        match self {
            CheckKey::EmailFormat => "Check the email address format",
            CheckKey::AppPwd => "Remove spaces and enter 16 letters or digits",
            CheckKey::Server => "Automation server did not answer /api/health",
            CheckKey::TargetMailbox
            | CheckKey::SitePwd
            | CheckKey::ApiUrl
            | CheckKey::ApiId
            | CheckKey::ApiPwd => "Required (must not be blank)",
        }
    }
}

impl fmt::Display for CheckKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Not evaluated yet.
    Unknown,
    /// Passing.
    Pass,
    /// Failing.
    Fail,
}

impl CheckStatus {
    /// Maps a boolean outcome.
    pub fn from_bool(pass: bool) -> Self {
        if pass { CheckStatus::Pass } else { CheckStatus::Fail }
    }
}

/// One evaluated prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckItem {
    /// Which prerequisite.
    pub key: CheckKey,
    /// Display label.
    pub label: String,
    /// Outcome.
    pub pass: CheckStatus,
    /// Hint shown when not passing; empty on pass.
    pub hint: String,
}

impl CheckItem {
    /// Builds an evaluated item with the key's fixed hint on failure.
    pub fn evaluated(key: CheckKey, pass: bool) -> Self {
        Self {
            key,
            label: key.label().to_string(),
            pass: CheckStatus::from_bool(pass),
            hint: if pass { String::new() } else { key.failure_hint().to_string() },
        }
    }

    /// Builds an item that has not been evaluated.
    pub fn pending(key: CheckKey) -> Self {
        Self {
            key,
            label: key.label().to_string(),
            pass: CheckStatus::Unknown,
            hint: key.failure_hint().to_string(),
        }
    }

    /// Returns `true` only for a definite pass.
    pub fn passed(&self) -> bool {
        self.pass == CheckStatus::Pass
    }
}

/// Launch mode accepted by the start endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One pass, then the job ends.
    Single,
    /// Repeated passes every `interval_secs`.
    Continuous {
        /// Seconds between passes.
        interval_secs: u32,
    },
}

impl RunMode {
    /// Builds a validated continuous mode.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidInterval`] outside `1..=3600`.
    pub fn continuous(interval_secs: u32) -> Result<Self, CoreError> {
        if !(1..=MAX_RUN_INTERVAL_SECS).contains(&interval_secs) {
            return Err(CoreError::InvalidInterval(interval_secs));
        }
        Ok(RunMode::Continuous { interval_secs })
    }

    /// Wire code sent as `mode`.
    pub fn wire_code(self) -> &'static str {
        match self {
            RunMode::Single => "1",
            RunMode::Continuous { .. } => "2",
        }
    }

    /// Interval sent alongside the mode.
    pub fn interval_secs(self) -> u32 {
        match self {
            RunMode::Single => DEFAULT_RUN_INTERVAL_SECS,
            RunMode::Continuous { interval_secs } => interval_secs,
        }
    }
}

/// Phase of the local run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run has been requested, or the controller was torn down.
    Idle,
    /// Start request in flight.
    Starting,
    /// Server accepted the start; polling is active.
    Running,
    /// Run ended normally or was stopped.
    Stopped,
    /// Start or the remote job failed.
    Error,
}

impl RunPhase {
    /// Returns `true` while a run is being started or observed.
    pub fn is_active(self) -> bool {
        matches!(self, RunPhase::Starting | RunPhase::Running)
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Starting => "starting",
            RunPhase::Running => "running",
            RunPhase::Stopped => "stopped",
            RunPhase::Error => "error",
        }
    }
}

/// Error type for core model validation and codec failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// User id cannot address a record.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),
    /// Continuous interval out of range.
    #[error("run interval must be within 1..={MAX_RUN_INTERVAL_SECS} seconds, got {0}")]
    InvalidInterval(u32),
    /// JSON encoding/decoding error.
    #[error("record codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}
