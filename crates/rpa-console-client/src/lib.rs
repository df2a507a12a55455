#![warn(missing_docs)]
//! # rpa-console-client
//!
//! ## Purpose
//! Typed async client for the automation server's HTTP API.
//!
//! ## Responsibilities
//! - Abstract request execution behind [`RpaTransport`] so tests can
//!   substitute a scripted server.
//! - Provide the `reqwest`-backed [`HttpTransport`].
//! - Build endpoint paths and encode/decode bodies for each operation.
//!
//! ## Data flow
//! Run controller / console -> [`RpaClient`] -> [`RpaTransport`] -> raw
//! [`TransportResponse`] -> typed contract payload.
//!
//! ## Ownership and lifetimes
//! The client holds an `Arc<dyn RpaTransport>` and is cheap to clone into
//! spawned poll tasks.
//!
//! ## Error model
//! Network failures, unexpected statuses and undecodable bodies map to
//! [`ClientError`]. Application-level failures (`success: false`) are not
//! errors here; callers inspect the decoded payload.
//!
//! ## Security and privacy notes
//! Only user ids, phone numbers and message text leave the process. Request
//! bodies are never logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rpa_console_contract::{
    ActionResponse, ContractError, HistoryRequest, LogsResponse, PersonalInfoResponse,
    SmsSendRequest, SmsSendResponse, StartRequest, StatusResponse, UserRequest, parse_body,
};
use rpa_console_core::RunMode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default number of log lines requested.
pub const DEFAULT_LOG_LIMIT: u32 = 200;

/// Raw HTTP reply handed back by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body text.
    pub body: String,
}

impl TransportResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes requests against the automation server.
#[async_trait]
pub trait RpaTransport: Send + Sync {
    /// Issues a GET for `path` (leading `/`, may carry a query string).
    async fn get(&self, path: &str) -> Result<TransportResponse, ClientError>;

    /// Issues a POST of a JSON body.
    async fn post(&self, path: &str, body: serde_json::Value)
    -> Result<TransportResponse, ClientError>;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Server origin, e.g. `http://localhost:8888`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl HttpTransportConfig {
    /// Config with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidBaseUrl`] for blank, unparsable or
    /// non-HTTP base URLs.
    pub fn new(config: HttpTransportConfig) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: normalize_base_url(&config.base_url)?,
            timeout: Duration::from_millis(config.timeout_ms.max(100)),
            http: reqwest::Client::new(),
        })
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        let trimmed = path.trim();
        if trimmed.starts_with('/') {
            format!("{}{}", self.base_url, trimmed)
        } else {
            format!("{}/{}", self.base_url, trimmed)
        }
    }

    async fn read(response: reqwest::Response) -> Result<TransportResponse, ClientError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| ClientError::Request {
            message: error.to_string(),
        })?;
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl RpaTransport for HttpTransport {
    async fn get(&self, path: &str) -> Result<TransportResponse, ClientError> {
        let response = self
            .http
            .get(self.endpoint(path))
            .header("x-request-id", request_id())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| ClientError::Request {
                message: error.to_string(),
            })?;
        Self::read(response).await
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<TransportResponse, ClientError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .header("x-request-id", request_id())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|error| ClientError::Request {
                message: error.to_string(),
            })?;
        Self::read(response).await
    }
}

fn request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

fn normalize_base_url(base_url: &str) -> Result<String, ClientError> {
    let trimmed = base_url.trim();
    let parsed =
        Url::parse(trimmed).map_err(|_| ClientError::InvalidBaseUrl(trimmed.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientError::InvalidBaseUrl(trimmed.to_string()));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Typed operations of the automation server.
#[derive(Clone)]
pub struct RpaClient {
    transport: Arc<dyn RpaTransport>,
}

impl RpaClient {
    /// Wraps a transport.
    pub fn new(transport: Arc<dyn RpaTransport>) -> Self {
        Self { transport }
    }

    /// Liveness endpoint.
    #[must_use]
    pub fn health_path() -> &'static str {
        "/api/health"
    }

    /// Start endpoint.
    #[must_use]
    pub fn start_path() -> &'static str {
        "/api/rpa/start"
    }

    /// Stop endpoint.
    #[must_use]
    pub fn stop_path() -> &'static str {
        "/api/rpa/stop"
    }

    /// Status endpoint for one user.
    #[must_use]
    pub fn status_path(user_id: &str) -> String {
        format!("/api/rpa/status/{}", encode_segment(user_id))
    }

    /// Logs endpoint for one user.
    #[must_use]
    pub fn logs_path(user_id: &str, limit: u32) -> String {
        format!("/api/rpa/logs/{}?limit={limit}", encode_segment(user_id))
    }

    /// Personal-info endpoint.
    #[must_use]
    pub fn personal_info_path() -> &'static str {
        "/api/rpa/personal-info"
    }

    /// History endpoint.
    #[must_use]
    pub fn history_path() -> &'static str {
        "/api/rpa/history"
    }

    /// SMS send endpoint.
    #[must_use]
    pub fn sms_send_path() -> &'static str {
        "/api/sms/send"
    }

    /// Calls the liveness endpoint once.
    ///
    /// # Errors
    /// Returns [`ClientError::Http`] for non-2xx replies and transport errors
    /// otherwise.
    pub async fn health(&self) -> Result<(), ClientError> {
        let response = self.transport.get(Self::health_path()).await?;
        ensure_success(response).map(|_| ())
    }

    /// Launches the job; `mode` is omitted from the body when `None`.
    ///
    /// # Errors
    /// Transport and decode failures only; inspect `success` for the outcome.
    pub async fn start(
        &self,
        user_id: &str,
        mode: Option<RunMode>,
    ) -> Result<ActionResponse, ClientError> {
        let request = StartRequest {
            user_uid: user_id.to_string(),
            mode: mode.map(|mode| mode.wire_code().to_string()),
            interval: mode.map(RunMode::interval_secs),
        };
        self.post_decoded(Self::start_path(), &request).await
    }

    /// Stops the job.
    ///
    /// # Errors
    /// Transport and decode failures only.
    pub async fn stop(&self, user_id: &str) -> Result<ActionResponse, ClientError> {
        self.post_decoded(Self::stop_path(), &user_request(user_id))
            .await
    }

    /// Reads the job status.
    ///
    /// # Errors
    /// Transport and decode failures only.
    pub async fn status(&self, user_id: &str) -> Result<StatusResponse, ClientError> {
        self.get_decoded(&Self::status_path(user_id)).await
    }

    /// Reads up to `limit` log lines.
    ///
    /// # Errors
    /// Transport and decode failures only.
    pub async fn logs(&self, user_id: &str, limit: u32) -> Result<LogsResponse, ClientError> {
        self.get_decoded(&Self::logs_path(user_id, limit)).await
    }

    /// Requests the personal-info extraction.
    ///
    /// # Errors
    /// Transport and decode failures only.
    pub async fn personal_info(&self, user_id: &str) -> Result<PersonalInfoResponse, ClientError> {
        self.post_decoded(Self::personal_info_path(), &user_request(user_id))
            .await
    }

    /// Stores personal-info results in the server history.
    ///
    /// # Errors
    /// Returns [`ClientError::Http`] for non-2xx replies. The body is not
    /// inspected.
    pub async fn post_history(
        &self,
        user_id: &str,
        results: Vec<serde_json::Value>,
    ) -> Result<(), ClientError> {
        let request = HistoryRequest {
            user_uid: user_id.to_string(),
            results,
        };
        let response = self
            .transport
            .post(Self::history_path(), encode(&request)?)
            .await?;
        ensure_success(response).map(|_| ())
    }

    /// Sends one SMS through the server's gateway.
    ///
    /// # Errors
    /// Transport and decode failures only.
    pub async fn send_sms(
        &self,
        user_id: &str,
        phone: &str,
        message: &str,
    ) -> Result<SmsSendResponse, ClientError> {
        let request = SmsSendRequest {
            user_uid: user_id.to_string(),
            phone: phone.to_string(),
            message: message.to_string(),
        };
        self.post_decoded(Self::sms_send_path(), &request).await
    }

    async fn get_decoded<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.transport.get(path).await?;
        decode(path, response)
    }

    async fn post_decoded<Req, Res>(&self, path: &str, request: &Req) -> Result<Res, ClientError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let response = self.transport.post(path, encode(request)?).await?;
        decode(path, response)
    }
}

fn user_request(user_id: &str) -> UserRequest {
    UserRequest {
        user_uid: user_id.to_string(),
    }
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.trim().as_bytes()).collect()
}

fn encode<T: Serialize>(request: &T) -> Result<serde_json::Value, ClientError> {
    serde_json::to_value(request).map_err(|error| ClientError::Encode {
        message: error.to_string(),
    })
}

// The server reports failures in-body, so any status with a JSON body decodes.
fn decode<T: DeserializeOwned>(path: &str, response: TransportResponse) -> Result<T, ClientError> {
    match parse_body::<T>(&response.body) {
        Ok(parsed) => Ok(parsed),
        Err(ContractError::Decode(error)) if response.is_success() => {
            debug!(stage = "client", action = "decode", path, "undecodable success body");
            Err(ClientError::Decode {
                message: error.to_string(),
            })
        }
        Err(_) => Err(http_error(response)),
    }
}

fn ensure_success(response: TransportResponse) -> Result<TransportResponse, ClientError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(http_error(response))
    }
}

fn http_error(response: TransportResponse) -> ClientError {
    let body = response.body.trim();
    ClientError::Http {
        status: response.status,
        body: if body.is_empty() {
            "<empty>".to_string()
        } else {
            body.to_string()
        },
    }
}

/// Client error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Base URL is blank, unparsable, or not HTTP(S).
    #[error("invalid server base url: {0:?}")]
    InvalidBaseUrl(String),
    /// Network failure or timeout.
    #[error("request failed: {message}")]
    Request {
        /// Underlying error text.
        message: String,
    },
    /// Non-2xx reply without a decodable body.
    #[error("http {status}: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Body text.
        body: String,
    },
    /// Reply body did not match the expected payload.
    #[error("response decode failed: {message}")]
    Decode {
        /// Decoder error text.
        message: String,
    },
    /// Request body could not be encoded.
    #[error("request encode failed: {message}")]
    Encode {
        /// Encoder error text.
        message: String,
    },
}
