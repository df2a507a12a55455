//! Shared fixtures for app integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rpa_console_app::{Console, ConsoleParts, RunControllerConfig};
use rpa_console_auth::{IdentityProvider, StaticIdentityProvider, UserIdentity};
use rpa_console_client::{ClientError, RpaClient, RpaTransport, TransportResponse};
use rpa_console_core::{CheckItem, CheckKey, EmailConfig, SmsConfig, UserConfig};
use rpa_console_store::{ConfigStoreClient, MemoryConfigStore};
use serde_json::Value;

/// User id used across fixtures.
pub const USER_ID: &str = "uid-1";

/// Poll interval used by controller fixtures.
pub const POLL: Duration = Duration::from_millis(5_000);

#[derive(Clone)]
enum Scripted {
    Reply {
        status: u16,
        body: String,
        delay: Duration,
    },
    Fail,
}

/// One request seen by [`FakeServer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// `GET` or `POST`.
    pub method: &'static str,
    /// Path including any query string.
    pub path: String,
    /// JSON body for POSTs.
    pub body: Option<Value>,
}

/// Scripted in-process server keyed by `"METHOD /path"` (query ignored).
///
/// Queued replies are served first, then the route's fallback reply.
#[derive(Default)]
pub struct FakeServer {
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fallback: Mutex<HashMap<String, Scripted>>,
    recorded: Mutex<Vec<Recorded>>,
}

fn route(method: &str, path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    format!("{method} {path}")
}

impl FakeServer {
    /// Empty server; every unscripted request fails at the transport.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues one reply.
    pub fn once(&self, method: &str, path: &str, status: u16, body: &str) -> &Self {
        self.once_delayed(method, path, status, body, Duration::ZERO)
    }

    /// Queues one reply delivered after `delay`.
    pub fn once_delayed(
        &self,
        method: &str,
        path: &str,
        status: u16,
        body: &str,
        delay: Duration,
    ) -> &Self {
        self.queued
            .lock()
            .expect("queue lock")
            .entry(route(method, path))
            .or_default()
            .push_back(Scripted::Reply {
                status,
                body: body.to_string(),
                delay,
            });
        self
    }

    /// Queues one transport failure.
    pub fn fail_once(&self, method: &str, path: &str) -> &Self {
        self.queued
            .lock()
            .expect("queue lock")
            .entry(route(method, path))
            .or_default()
            .push_back(Scripted::Fail);
        self
    }

    /// Sets the reply served once the queue is empty.
    pub fn always(&self, method: &str, path: &str, status: u16, body: &str) -> &Self {
        self.fallback.lock().expect("fallback lock").insert(
            route(method, path),
            Scripted::Reply {
                status,
                body: body.to_string(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Number of requests seen for one route.
    pub fn count(&self, method: &str, path: &str) -> usize {
        let wanted = route(method, path);
        self.recorded
            .lock()
            .expect("recorded lock")
            .iter()
            .filter(|request| route(request.method, &request.path) == wanted)
            .count()
    }

    /// Total requests seen.
    pub fn total(&self) -> usize {
        self.recorded.lock().expect("recorded lock").len()
    }

    /// All requests seen, in order.
    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().expect("recorded lock").clone()
    }

    async fn serve(
        &self,
        method: &'static str,
        path: &str,
        body: Option<Value>,
    ) -> Result<TransportResponse, ClientError> {
        self.recorded.lock().expect("recorded lock").push(Recorded {
            method,
            path: path.to_string(),
            body,
        });
        let key = route(method, path);
        let queued = self
            .queued
            .lock()
            .expect("queue lock")
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        let scripted = queued.or_else(|| self.fallback.lock().expect("fallback lock").get(&key).cloned());
        match scripted {
            Some(Scripted::Reply {
                status,
                body,
                delay,
            }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(TransportResponse { status, body })
            }
            Some(Scripted::Fail) => Err(ClientError::Request {
                message: "connection reset".to_string(),
            }),
            None => Err(ClientError::Request {
                message: format!("no route for {key}"),
            }),
        }
    }
}

#[async_trait]
impl RpaTransport for FakeServer {
    async fn get(&self, path: &str) -> Result<TransportResponse, ClientError> {
        self.serve("GET", path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<TransportResponse, ClientError> {
        self.serve("POST", path, Some(body)).await
    }
}

/// Status path for [`USER_ID`].
pub fn status_path() -> String {
    format!("/api/rpa/status/{USER_ID}")
}

/// Signed-in identity fixture.
pub fn identity() -> UserIdentity {
    UserIdentity::new(USER_ID, "owner@example.com").expect("identity fixture should build")
}

/// Record that passes every local check.
pub fn complete_config() -> UserConfig {
    let mut record = UserConfig::new_default(USER_ID, "owner@example.com", Utc::now());
    record.email_config = EmailConfig {
        address: "owner@example.com".to_string(),
        app_password: "abcd efgh ijkl mnop".to_string(),
        site_password: "site-secret".to_string(),
    };
    record.sms_config = SmsConfig {
        provider: "twilio".to_string(),
        api_url: "https://api.twilio.com/send".to_string(),
        api_id: "AC123".to_string(),
        api_password: "sms-secret".to_string(),
        sms_text_a: "Template A text".to_string(),
        sms_text_b: String::new(),
        use_delivery_report: false,
    };
    record
}

/// Eight passing checks.
pub fn passing_checks() -> Vec<CheckItem> {
    CheckKey::ALL
        .iter()
        .map(|key| CheckItem::evaluated(*key, true))
        .collect()
}

/// Controller config polling every [`POLL`].
pub fn controller_config() -> RunControllerConfig {
    RunControllerConfig {
        poll_interval: POLL,
        stale_after_polls: None,
    }
}

/// Console over `server`, an in-memory store seeded with `records`, and a
/// signed-in [`identity`].
pub fn console(server: &Arc<FakeServer>, records: Vec<UserConfig>) -> Console {
    console_with_identity(
        server,
        records,
        Arc::new(StaticIdentityProvider::signed_in(identity(), u64::MAX)),
    )
}

/// Console with an explicit identity provider.
pub fn console_with_identity(
    server: &Arc<FakeServer>,
    records: Vec<UserConfig>,
    identity: Arc<dyn IdentityProvider>,
) -> Console {
    Console::new(ConsoleParts {
        version: rpa_console_app::app_version().to_string(),
        store: ConfigStoreClient::new(Arc::new(MemoryConfigStore::with_records(records))),
        client: RpaClient::new(server.clone()),
        identity,
        controller: controller_config(),
        health_timeout: Duration::from_millis(3_000),
        log_limit: 200,
    })
}

/// Lets spawned tasks run to their next await point.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
