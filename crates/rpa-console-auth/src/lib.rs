#![warn(missing_docs)]
//! # rpa-console-auth
//!
//! ## Purpose
//! Models the signed-in identity that every launch and store access is bound to.
//!
//! ## Responsibilities
//! - Abstract the external identity provider behind [`IdentityProvider`].
//! - Track session lifecycle (sign-in, expiry, sign-out) in [`AuthStateMachine`].
//! - Answer whether an identity is currently bound for privileged actions.
//!
//! ## Data flow
//! Identity provider -> [`Session`] -> [`AuthStateMachine::on_sign_in`] ->
//! [`AuthStateMachine::bound_identity`] consumed by the console service.
//!
//! ## Ownership and lifetimes
//! Session values are owned so the provider and the state machine do not share
//! lifetimes.
//!
//! ## Error model
//! Provider failures and malformed sessions are surfaced as [`AuthError`].
//! A missing session is not an error: it is `Ok(None)` and routes to login.
//!
//! ## Security and privacy notes
//! The provider token is masked in `Debug` output and never logged.
//!
//! ## Example
//! ```rust
//! use rpa_console_auth::{AuthState, AuthStateMachine};
//!
//! let machine = AuthStateMachine::new();
//! assert!(matches!(machine.state(), AuthState::Unauthenticated));
//! assert!(machine.bound_identity(0).is_none());
//! ```

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable user id; keys the config record and every server call.
    pub uid: String,
    /// Account email, may be empty.
    #[serde(default)]
    pub email: String,
}

impl UserIdentity {
    /// Builds a validated identity.
    ///
    /// # Errors
    /// Returns [`AuthError::EmptyUserId`] for a blank uid.
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Result<Self, AuthError> {
        let uid = uid.into();
        if uid.trim().is_empty() {
            return Err(AuthError::EmptyUserId);
        }
        Ok(Self {
            uid: uid.trim().to_string(),
            email: email.into(),
        })
    }
}

/// Provider session with absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Signed-in identity.
    pub identity: UserIdentity,
    /// Opaque provider token.
    pub id_token: String,
    /// Absolute epoch milliseconds when the session expires.
    pub expires_at_ms: u64,
}

impl Session {
    /// Returns `true` when the session has expired at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("id_token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// Runtime authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Nobody is signed in.
    Unauthenticated,
    /// Session is currently valid.
    Authenticated(Session),
    /// Session expired; the user must sign in again.
    ReauthRequired,
}

/// Auth state machine with explicit legal transitions.
#[derive(Debug, Clone)]
pub struct AuthStateMachine {
    state: AuthState,
}

impl AuthStateMachine {
    /// Creates a new state machine in `Unauthenticated` state.
    pub fn new() -> Self {
        Self {
            state: AuthState::Unauthenticated,
        }
    }

    /// Returns current auth state snapshot.
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Applies a provider sign-in.
    pub fn on_sign_in(&mut self, session: Session) {
        self.state = AuthState::Authenticated(session);
    }

    /// Re-evaluates state based on session expiry.
    pub fn on_tick(&mut self, now_ms: u64) {
        if let AuthState::Authenticated(session) = &self.state
            && session.is_expired(now_ms)
        {
            self.state = AuthState::ReauthRequired;
        }
    }

    /// Explicit sign-out transition.
    pub fn sign_out(&mut self) {
        self.state = AuthState::Unauthenticated;
    }

    /// Identity bound for privileged actions, if the session is still valid.
    pub fn bound_identity(&self, now_ms: u64) -> Option<&UserIdentity> {
        match &self.state {
            AuthState::Authenticated(session) if !session.is_expired(now_ms) => {
                Some(&session.identity)
            }
            _ => None,
        }
    }

    /// Returns `true` when the view must route to the login flow.
    pub fn login_required(&self, now_ms: u64) -> bool {
        self.bound_identity(now_ms).is_none()
    }
}

impl Default for AuthStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// External identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Returns the current session, or `None` when nobody is signed in.
    ///
    /// # Errors
    /// Returns [`AuthError::Provider`] when the provider cannot be reached.
    fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Ends the provider session.
    ///
    /// # Errors
    /// Returns [`AuthError::Provider`] when the provider rejects the sign-out.
    fn sign_out(&self) -> Result<(), AuthError>;
}

/// Provider holding one fixed session, supplied at startup.
#[derive(Debug)]
pub struct StaticIdentityProvider {
    session: Mutex<Option<Session>>,
}

impl StaticIdentityProvider {
    /// Creates a provider that is signed in as `identity` until `expires_at_ms`.
    pub fn signed_in(identity: UserIdentity, expires_at_ms: u64) -> Self {
        Self {
            session: Mutex::new(Some(Session {
                identity,
                id_token: String::new(),
                expires_at_ms,
            })),
        }
    }

    /// Creates a provider with nobody signed in.
    pub fn signed_out() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let session = self
            .session
            .lock()
            .map_err(|_| AuthError::Provider("session lock poisoned".to_string()))?;
        Ok(session.clone())
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| AuthError::Provider("session lock poisoned".to_string()))?;
        *session = None;
        Ok(())
    }
}

/// Errors produced by identity and session handling.
#[derive(Debug, Error)]
pub enum AuthError {
    /// User id is blank.
    #[error("user id must be non-empty")]
    EmptyUserId,
    /// Provider failure.
    #[error("identity provider failure: {0}")]
    Provider(String),
}
