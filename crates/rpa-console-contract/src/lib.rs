#![warn(missing_docs)]
//! # rpa-console-contract
//!
//! ## Purpose
//! Defines the automation server's request/response payloads and the
//! client-side mapping helpers built on them.
//!
//! ## Responsibilities
//! - Encode request bodies with the server's camelCase field names.
//! - Decode response bodies leniently (missing optional fields default).
//! - Map raw status strings to [`RemoteStatus`] and render status lines.
//! - Extract gateway status codes from SMS send output.
//!
//! ## Data flow
//! Raw JSON body -> [`parse_body`] -> typed response -> run controller and
//! view projections.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs to avoid borrowing from transient network
//! buffers.
//!
//! ## Error model
//! Undecodable bodies return [`ContractError::Decode`].
//!
//! ## Security and privacy notes
//! Request bodies carry the user id only; credentials never travel through
//! this contract.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error text used when the server reports failure without a message.
pub const UNKNOWN_ERROR: &str = "unknown error";

static GATEWAY_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"STATUS:\s*(\d+)").expect("gateway status pattern is a valid regex")
});

/// Body of `POST /api/rpa/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Owning user id.
    pub user_uid: String,
    /// Mode wire code (`"1"` single, `"2"` continuous).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Seconds between continuous passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
}

/// Body carrying only the user id (stop, personal-info).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    /// Owning user id.
    pub user_uid: String,
}

/// Body of `POST /api/rpa/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    /// Owning user id.
    pub user_uid: String,
    /// Personal-info results, passed through untouched.
    pub results: Vec<Value>,
}

/// Body of `POST /api/sms/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsSendRequest {
    /// Owning user id.
    pub user_uid: String,
    /// Recipient number.
    pub phone: String,
    /// Message body.
    pub message: String,
}

/// Generic `{ success, error? }` reply of start and stop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Server-side outcome.
    #[serde(default)]
    pub success: bool,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    /// Error message, or [`UNKNOWN_ERROR`] when the server sent none.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
    }
}

/// Reply of `GET /api/rpa/status/{userUid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Server-side outcome.
    #[serde(default)]
    pub success: bool,
    /// Raw status string.
    #[serde(default)]
    pub status: Option<String>,
    /// Server-formatted start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Server-formatted end time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Number of log lines the job has produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_count: Option<u64>,
    /// Job error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    /// Mapped status; a missing status reads as [`RemoteStatus::Unknown`].
    pub fn remote_status(&self) -> RemoteStatus {
        self.status
            .as_deref()
            .map(RemoteStatus::parse)
            .unwrap_or(RemoteStatus::Unknown)
    }
}

/// Job status reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Job is executing.
    Running,
    /// Job finished normally.
    Completed,
    /// Job failed.
    Error,
    /// Job was stopped.
    Stopped,
    /// No job exists for the user.
    NotRunning,
    /// Status field absent.
    Unknown,
    /// Any other string, preserved verbatim.
    Other(String),
}

impl RemoteStatus {
    /// Maps a raw status string.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => RemoteStatus::Running,
            "completed" => RemoteStatus::Completed,
            "error" => RemoteStatus::Error,
            "stopped" => RemoteStatus::Stopped,
            "not_running" => RemoteStatus::NotRunning,
            "" | "unknown" => RemoteStatus::Unknown,
            other => RemoteStatus::Other(other.to_string()),
        }
    }

    /// Returns `true` for statuses that end polling.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteStatus::Completed | RemoteStatus::Error | RemoteStatus::Stopped
        )
    }
}

/// Renders the one-line status text shown while a run is observed.
pub fn render_status(response: &StatusResponse) -> String {
    let head = match response.remote_status() {
        RemoteStatus::Running => "Running".to_string(),
        RemoteStatus::Completed => "Completed".to_string(),
        RemoteStatus::Error => match response.error.as_deref() {
            Some(message) if !message.is_empty() => format!("Error: {message}"),
            _ => "Error".to_string(),
        },
        RemoteStatus::Stopped => "Stopped".to_string(),
        RemoteStatus::NotRunning => "Not running".to_string(),
        RemoteStatus::Unknown => "Unknown".to_string(),
        RemoteStatus::Other(raw) => format!("Status: {raw}"),
    };

    let mut parts = vec![head];
    if let Some(start) = &response.start_time {
        parts.push(format!("Started: {start}"));
    }
    if let Some(end) = &response.end_time {
        parts.push(format!("Ended: {end}"));
    }
    if let Some(count) = response.log_count {
        parts.push(format!("Logs: {count}"));
    }
    parts.join(" / ")
}

/// Output stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LogChannel {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl From<String> for LogChannel {
    fn from(raw: String) -> Self {
        if raw == "stderr" {
            LogChannel::Stderr
        } else {
            LogChannel::Stdout
        }
    }
}

impl fmt::Display for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogChannel::Stdout => "STDOUT",
            LogChannel::Stderr => "STDERR",
        })
    }
}

/// One job log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Server-formatted timestamp.
    #[serde(default)]
    pub timestamp: String,
    /// Source stream, sent as `type`.
    #[serde(rename = "type", default = "default_channel")]
    pub channel: LogChannel,
    /// Line text.
    #[serde(default)]
    pub message: String,
}

fn default_channel() -> LogChannel {
    LogChannel::Stdout
}

/// Reply of `GET /api/rpa/logs/{userUid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    /// Server-side outcome.
    #[serde(default)]
    pub success: bool,
    /// Total lines held by the server, which may exceed `logs.len()`.
    #[serde(default)]
    pub total_logs: u64,
    /// Lines in server order.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Nested `data` object of the personal-info reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfoData {
    /// Extracted records.
    #[serde(default)]
    pub results: Option<Vec<Value>>,
}

/// Reply of `POST /api/rpa/personal-info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfoResponse {
    /// Server-side outcome.
    #[serde(default)]
    pub success: bool,
    /// Preferred result location.
    #[serde(default)]
    pub data: Option<PersonalInfoData>,
    /// Legacy top-level result location.
    #[serde(default)]
    pub results: Option<Vec<Value>>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PersonalInfoResponse {
    /// Results from `data.results`, falling back to top-level `results`.
    pub fn into_results(self) -> Vec<Value> {
        self.data
            .and_then(|data| data.results)
            .or(self.results)
            .unwrap_or_default()
    }
}

/// Reply of `POST /api/sms/send`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsSendResponse {
    /// Gateway outcome.
    #[serde(default)]
    pub success: bool,
    /// Gateway output on success.
    #[serde(default)]
    pub output: Option<String>,
    /// Failure message.
    #[serde(default)]
    pub error: Option<String>,
    /// Gateway diagnostics on failure.
    #[serde(default)]
    pub details: Option<String>,
}

impl SmsSendResponse {
    /// Gateway status code for display.
    ///
    /// Success replies default to `200`, failures to `Unknown`.
    pub fn gateway_status(&self) -> String {
        let (source, fallback) = if self.success {
            (self.output.as_deref(), "200")
        } else {
            (self.details.as_deref(), "Unknown")
        };
        source
            .and_then(extract_gateway_status)
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Extracts `<code>` from a `STATUS: <code>` marker.
pub fn extract_gateway_status(text: &str) -> Option<String> {
    GATEWAY_STATUS
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|code| code.as_str().to_string())
}

/// Decodes a response body.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON or mismatched shapes.
pub fn parse_body<T: DeserializeOwned>(raw: &str) -> Result<T, ContractError> {
    serde_json::from_str(raw).map_err(ContractError::Decode)
}

/// Contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
}
