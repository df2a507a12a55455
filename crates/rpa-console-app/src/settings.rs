//! Session settings resolved from CLI flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use rpa_console_client::{DEFAULT_LOG_LIMIT, DEFAULT_TIMEOUT_MS, HttpTransportConfig};

use crate::run_controller::RunControllerConfig;

/// Default automation server origin.
pub const DEFAULT_API_BASE: &str = "http://localhost:8888";

/// Console settings.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ConsoleSettings {
    /// Automation server origin.
    #[arg(long, env = "RPA_CONSOLE_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Milliseconds between status polls.
    #[arg(
        long,
        env = "RPA_CONSOLE_POLL_INTERVAL_MS",
        default_value_t = 5_000,
        value_parser = clap::value_parser!(u64).range(100..)
    )]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout in milliseconds.
    #[arg(long, env = "RPA_CONSOLE_HTTP_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub http_timeout_ms: u64,

    /// Health probe timeout in milliseconds.
    #[arg(long, env = "RPA_CONSOLE_HEALTH_TIMEOUT_MS", default_value_t = 3_000)]
    pub health_timeout_ms: u64,

    /// Directory of the file-backed config store; in-memory when absent.
    #[arg(long, env = "RPA_CONSOLE_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Log lines requested per fetch.
    #[arg(long, env = "RPA_CONSOLE_LOG_LIMIT", default_value_t = DEFAULT_LOG_LIMIT)]
    pub log_limit: u32,

    /// Failed polls after which a run is marked errored; unset polls forever.
    #[arg(long, env = "RPA_CONSOLE_STALE_AFTER_POLLS")]
    pub stale_after_polls: Option<u32>,

    /// Signed-in user id.
    #[arg(long, env = "RPA_CONSOLE_USER_ID")]
    pub user_id: Option<String>,

    /// Signed-in user email.
    #[arg(long, env = "RPA_CONSOLE_USER_EMAIL", default_value = "")]
    pub user_email: String,
}

impl ConsoleSettings {
    /// Settings pointing at `api_base` with every other value defaulted.
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            poll_interval_ms: 5_000,
            http_timeout_ms: DEFAULT_TIMEOUT_MS,
            health_timeout_ms: 3_000,
            store_dir: None,
            log_limit: DEFAULT_LOG_LIMIT,
            stale_after_polls: None,
            user_id: None,
            user_email: String::new(),
        }
    }

    /// Transport settings.
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.api_base.clone(),
            timeout_ms: self.http_timeout_ms,
        }
    }

    /// Run controller settings.
    pub fn controller_config(&self) -> RunControllerConfig {
        RunControllerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stale_after_polls: self.stale_after_polls.filter(|limit| *limit > 0),
        }
    }

    /// Health probe timeout.
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}
