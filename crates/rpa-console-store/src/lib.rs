#![warn(missing_docs)]
//! # rpa-console-store
//!
//! ## Purpose
//! Reads and writes the per-user configuration record.
//!
//! ## Responsibilities
//! - Define a backend-agnostic [`ConfigStore`] trait.
//! - Provide a file-backed store for real sessions and an in-memory store for
//!   tests and ephemeral sessions; the console picks one at composition time.
//! - Create the default record exactly once on a user's first read.
//! - Apply settings-form writes and refresh `updated_at`.
//!
//! ## Data flow
//! Console service -> [`ConfigStoreClient::get_or_create`] -> backend ->
//! [`UserConfig`] consumed read-only by the validator.
//!
//! ## Ownership and lifetimes
//! Backends return owned records; no borrowed store memory escapes.
//!
//! ## Error model
//! Invalid keys, I/O failures, and corrupt documents are reported as
//! [`StoreError`] values.
//!
//! ## Security and privacy notes
//! Records are persisted as plaintext JSON; encryption at rest is the
//! deployment's concern. Record contents are never logged.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rpa_console_auth::UserIdentity;
use rpa_console_core::{
    CoreError, EmailConfig, SmsConfig, USER_CONFIG_COLLECTION, UserConfig, detect_provider,
    record_key,
};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Trait implemented by concrete record backends.
pub trait ConfigStore: Send + Sync {
    /// Reads one record.
    ///
    /// # Errors
    /// Returns [`StoreError`] on key, I/O or decode failures.
    fn load(&self, user_id: &str) -> Result<Option<UserConfig>, StoreError>;

    /// Writes `record` only if no record exists yet for its user.
    ///
    /// # Returns
    /// The record that is stored after the call: `record` itself, or the one
    /// another writer created first.
    fn create_if_absent(&self, record: UserConfig) -> Result<UserConfig, StoreError>;

    /// Overwrites the record for its user.
    ///
    /// # Errors
    /// Returns [`StoreError`] on key, I/O or encode failures.
    fn save(&self, record: &UserConfig) -> Result<(), StoreError>;
}

/// File-backed store laid out as `<root>/user_configs/<uid>.json`.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    root: PathBuf,
}

impl FileConfigStore {
    /// Opens a store rooted at `root`, creating the collection directory.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] when the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let collection = root.join(USER_CONFIG_COLLECTION);
        fs::create_dir_all(&collection).map_err(|source| StoreError::Io {
            path: collection.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        let key = record_key(user_id)?;
        Ok(self.root.join(format!("{key}.json")))
    }

    /// Writes `encoded` to a uniquely named file next to `path`, so the record
    /// path itself only ever holds complete documents.
    fn stage(&self, path: &Path, encoded: &[u8]) -> Result<NamedTempFile, StoreError> {
        let dir = path.parent().unwrap_or(&self.root);
        let io_error = |source: std::io::Error| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(io_error)?;
        staged.write_all(encoded).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        Ok(staged)
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self, user_id: &str) -> Result<Option<UserConfig>, StoreError> {
        let path = self.record_path(user_id)?;
        match fs::read(&path) {
            Ok(raw) => Ok(Some(UserConfig::from_json_bytes(&raw)?)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn create_if_absent(&self, record: UserConfig) -> Result<UserConfig, StoreError> {
        let path = self.record_path(&record.user_id)?;
        let staged = self.stage(&path, &record.to_json_bytes()?)?;

        // First publisher wins; the staged file is removed when persisting fails.
        match staged.persist_noclobber(&path) {
            Ok(_) => {
                debug!(stage = "store", action = "create", user_id = %record.user_id, "default record created");
                Ok(record)
            }
            Err(error) if error.error.kind() == ErrorKind::AlreadyExists => self
                .load(&record.user_id)?
                .ok_or_else(|| StoreError::Backend("record vanished after create race".to_string())),
            Err(error) => Err(StoreError::Io {
                path,
                source: error.error,
            }),
        }
    }

    fn save(&self, record: &UserConfig) -> Result<(), StoreError> {
        let path = self.record_path(&record.user_id)?;
        let staged = self.stage(&path, &record.to_json_bytes()?)?;
        staged.persist(&path).map_err(|error| StoreError::Io {
            path,
            source: error.error,
        })?;
        Ok(())
    }
}

/// In-memory store for tests and sessions without a store directory.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    records: Mutex<HashMap<String, UserConfig>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `records`.
    pub fn with_records(records: impl IntoIterator<Item = UserConfig>) -> Self {
        Self {
            records: Mutex::new(
                records
                    .into_iter()
                    .map(|record| (record.user_id.trim().to_string(), record))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, UserConfig>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, user_id: &str) -> Result<Option<UserConfig>, StoreError> {
        let key = memory_key(user_id)?;
        Ok(self.lock()?.get(&key).cloned())
    }

    fn create_if_absent(&self, record: UserConfig) -> Result<UserConfig, StoreError> {
        let key = memory_key(&record.user_id)?;
        let mut records = self.lock()?;
        Ok(records.entry(key).or_insert(record).clone())
    }

    fn save(&self, record: &UserConfig) -> Result<(), StoreError> {
        let key = memory_key(&record.user_id)?;
        self.lock()?.insert(key, record.clone());
        Ok(())
    }
}

/// Validated map key; ids resolve the same way as file record paths.
fn memory_key(user_id: &str) -> Result<String, StoreError> {
    record_key(user_id)?;
    Ok(user_id.trim().to_string())
}

/// Settings-form payload for the email section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    /// Mailbox address.
    pub address: String,
    /// Application password as typed.
    pub app_password: String,
    /// Site login password.
    pub site_password: String,
}

/// Settings-form payload for the SMS section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsSettings {
    /// Gateway URL.
    pub api_url: String,
    /// Gateway id.
    pub api_id: String,
    /// Gateway password.
    pub api_password: String,
    /// Template A.
    pub sms_text_a: String,
    /// Template B.
    pub sms_text_b: String,
}

/// Identity-scoped operations over a [`ConfigStore`] backend.
#[derive(Clone)]
pub struct ConfigStoreClient {
    store: Arc<dyn ConfigStore>,
}

impl ConfigStoreClient {
    /// Wraps a backend chosen by the caller.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Reads the identity's record, creating the default one on first access.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub fn get_or_create(
        &self,
        identity: &UserIdentity,
        now: DateTime<Utc>,
    ) -> Result<UserConfig, StoreError> {
        if let Some(record) = self.store.load(&identity.uid)? {
            return Ok(record);
        }
        self.store
            .create_if_absent(UserConfig::new_default(&identity.uid, &identity.email, now))
    }

    /// Replaces the email section and refreshes `updated_at`.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub fn update_email_config(
        &self,
        identity: &UserIdentity,
        settings: EmailSettings,
        now: DateTime<Utc>,
    ) -> Result<UserConfig, StoreError> {
        let email_config = EmailConfig {
            address: settings.address,
            app_password: settings.app_password,
            site_password: settings.site_password,
        };
        self.apply(identity, now, |record| record.email_config = email_config)
    }

    /// Replaces the SMS section, re-detects the provider, refreshes `updated_at`.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub fn update_sms_config(
        &self,
        identity: &UserIdentity,
        settings: SmsSettings,
        now: DateTime<Utc>,
    ) -> Result<UserConfig, StoreError> {
        let sms_config = SmsConfig {
            provider: detect_provider(&settings.api_url).as_str().to_string(),
            api_url: settings.api_url,
            api_id: settings.api_id,
            api_password: settings.api_password,
            sms_text_a: settings.sms_text_a,
            sms_text_b: settings.sms_text_b,
            use_delivery_report: false,
        };
        self.apply(identity, now, |record| record.sms_config = sms_config)
    }

    fn apply(
        &self,
        identity: &UserIdentity,
        now: DateTime<Utc>,
        mutate: impl FnOnce(&mut UserConfig),
    ) -> Result<UserConfig, StoreError> {
        let mut record = self.get_or_create(identity, now)?;
        mutate(&mut record);
        record.updated_at = now;
        self.store.save(&record)?;
        debug!(stage = "store", action = "update", user_id = %identity.uid, "record updated");
        Ok(record)
    }
}

/// Config store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key or codec failure from the core model.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// Filesystem failure.
    #[error("store i/o failure at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Backend runtime failure.
    #[error("config store backend failure: {0}")]
    Backend(String),
}
