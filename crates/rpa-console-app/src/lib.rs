#![warn(missing_docs)]
//! # rpa-console-app
//!
//! ## Purpose
//! Orchestrates config, validation, the server client and view state for
//! `rpa-console`.
//!
//! ## Responsibilities
//! - Gate the run start on the eight prerequisite checks and a bound user.
//! - Drive the start/poll/stop lifecycle with one cancellable poll task.
//! - Probe server health once per check refresh and periodically.
//! - Compose backends from [`ConsoleSettings`] and install logging.
//!
//! ## Data flow
//! Identity provider + config store + health probe -> validator -> view gate
//! -> run controller -> polled status -> view projection.
//!
//! ## Ownership and lifetimes
//! One [`Console`] per session owns its controller and view. Background
//! tasks hold `Arc` clones of the state they update and stop when their
//! owning handle is cancelled or dropped.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]; locally refused starts are
//! [`StartRejected`]. Poll failures never surface as errors.
//!
//! ## Security and privacy notes
//! - Credentials stay in the config store and never reach log fields.
//! - [`redact_sensitive`] scrubs free-form error text before it is logged.

pub mod console;
pub mod health;
pub mod periodic;
pub mod run_controller;
pub mod settings;
pub mod telemetry;

use std::sync::Arc;

use rpa_console_auth::{AuthError, IdentityProvider, StaticIdentityProvider, UserIdentity};
use rpa_console_client::{ClientError, HttpTransport, RpaClient};
use rpa_console_core::CoreError;
use rpa_console_store::{
    ConfigStore, ConfigStoreClient, FileConfigStore, MemoryConfigStore, StoreError,
};
use thiserror::Error;
use tracing::info;

pub use console::{Console, ConsoleParts};
pub use health::{HEALTH_RECHECK_INTERVAL, probe, probe_within};
pub use periodic::{PeriodicTask, TickFlow};
pub use run_controller::{
    LogPage, RunController, RunControllerConfig, RunRequestError, RunSnapshot, StartRejected,
};
pub use settings::ConsoleSettings;
pub use telemetry::{init_tracing, redact_sensitive};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("RPA_CONSOLE_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Picks the config backend: file-backed when a store directory is set.
///
/// # Errors
/// Returns [`AppError::Store`] when the directory cannot be prepared.
pub fn config_store_from_settings(
    settings: &ConsoleSettings,
) -> Result<Arc<dyn ConfigStore>, AppError> {
    match &settings.store_dir {
        Some(dir) => {
            info!(stage = "compose", action = "store", backend = "file", "using file config store");
            Ok(Arc::new(FileConfigStore::open(dir)?))
        }
        None => {
            info!(stage = "compose", action = "store", backend = "memory", "using in-memory config store");
            Ok(Arc::new(MemoryConfigStore::new()))
        }
    }
}

/// Identity provider for the configured user, signed out when none is set.
///
/// # Errors
/// Returns [`AppError::Auth`] for a blank user id.
pub fn identity_from_settings(
    settings: &ConsoleSettings,
) -> Result<Arc<dyn IdentityProvider>, AppError> {
    Ok(match &settings.user_id {
        Some(uid) => Arc::new(StaticIdentityProvider::signed_in(
            UserIdentity::new(uid.clone(), settings.user_email.clone())?,
            u64::MAX,
        )),
        None => Arc::new(StaticIdentityProvider::signed_out()),
    })
}

/// Builds a console over the HTTP transport described by `settings`.
///
/// # Errors
/// Returns [`AppError`] for an invalid base URL, store directory or user id.
pub fn build_console(settings: &ConsoleSettings) -> Result<Console, AppError> {
    let transport = HttpTransport::new(settings.transport_config())?;
    Ok(Console::new(ConsoleParts {
        version: app_version().to_string(),
        store: ConfigStoreClient::new(config_store_from_settings(settings)?),
        client: RpaClient::new(Arc::new(transport)),
        identity: identity_from_settings(settings)?,
        controller: settings.controller_config(),
        health_timeout: settings.health_timeout(),
        log_limit: settings.log_limit,
    }))
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// No signed-in user.
    #[error("sign-in required")]
    Unauthenticated,
    /// Auth subsystem error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// Config store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Server client error.
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    /// Core model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    /// Server reported `success: false`.
    #[error("server reported failure: {0}")]
    Server(String),
    /// Caller-supplied input cannot be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Start refused locally.
    #[error("start rejected: {0}")]
    StartRejected(#[from] StartRejected),
}

impl From<RunRequestError> for AppError {
    fn from(error: RunRequestError) -> Self {
        match error {
            RunRequestError::Server(message) => AppError::Server(message),
            RunRequestError::Client(error) => AppError::Client(error),
        }
    }
}
