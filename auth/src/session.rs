//! Staff sessions.
//!
//! A session is an opaque bearer token mapped to a user id with an absolute
//! expiry. Tokens are 256 random bits, base64url encoded without padding.

use crate::error::{AuthError, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use helpdesk_core::UserId;
use helpdesk_core::environment::{Clock, SystemClock};
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// A live staff session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Bearer token.
    pub token: String,
    /// Owner.
    pub user_id: UserId,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// The token is rejected from this instant on.
    pub expires_at: DateTime<Utc>,
}

/// Generate a fresh session token.
#[must_use]
pub fn generate_token() -> String {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Session storage.
pub trait SessionStore: Send + Sync {
    /// Store a new session, dropping any that have expired.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if the token already exists.
    fn create_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    /// Look a session up by token.
    ///
    /// Expired sessions are removed on lookup.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionNotFound`] for an unknown token
    /// - [`AuthError::SessionExpired`] once `expires_at` has passed
    fn get_session(&self, token: &str) -> impl Future<Output = Result<Session>> + Send;

    /// Revoke a session. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn delete_session(&self, token: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Process-local [`SessionStore`].
///
/// Sessions do not survive a restart.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    /// Create a store that checks expiry against `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Number of stored sessions, expired ones included.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn session_count(&self) -> Result<usize> {
        Ok(self
            .sessions
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))?
            .len())
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStore").finish_non_exhaustive()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let session = session.clone();
        let now = self.clock.now();

        async move {
            let mut guard = sessions
                .lock()
                .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))?;

            guard.retain(|_, existing| existing.expires_at > now);

            if guard.contains_key(&session.token) {
                return Err(AuthError::InternalError("Session token already exists".to_string()));
            }

            guard.insert(session.token.clone(), session);
            Ok(())
        }
    }

    fn get_session(&self, token: &str) -> impl Future<Output = Result<Session>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let token = token.to_string();
        let now = self.clock.now();

        async move {
            let mut guard = sessions
                .lock()
                .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))?;

            let session = guard.get(&token).cloned().ok_or(AuthError::SessionNotFound)?;

            if session.expires_at <= now {
                guard.remove(&token);
                return Err(AuthError::SessionExpired);
            }

            Ok(session)
        }
    }

    fn delete_session(&self, token: &str) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let token = token.to_string();

        async move {
            sessions
                .lock()
                .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))?
                .remove(&token);
            Ok(())
        }
    }
}
