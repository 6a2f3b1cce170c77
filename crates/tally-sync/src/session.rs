//! # Remote Session Manager
//!
//! Obtains a fresh session from the remote store at the start of each cycle.
//!
//! ## Handshake
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Authentication Flow                                │
//! │                                                                         │
//! │  ┌────────────────┐                          ┌─────────────────┐       │
//! │  │  SyncLoop      │                          │  Remote store   │       │
//! │  └───────┬────────┘                          └────────┬────────┘       │
//! │          │  POST /web/session/authenticate            │                │
//! │          │  {db, login, password}                     │                │
//! │          │───────────────────────────────────────────►│                │
//! │          │                                            │                │
//! │          │  Set-Cookie: session_id=...                │                │
//! │          │  {"result": {"uid": 2, ...}}               │                │
//! │          │◄───────────────────────────────────────────│                │
//! │          │                                            │                │
//! │   uid > 0 AND a session credential ──► SessionHandle                   │
//! │   anything else                    ──► AuthFailure                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is cached: the handle lives for one cycle and is dropped.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use tally_core::SessionHandle;

use crate::remote::RemoteApi;

// =============================================================================
// Credentials
// =============================================================================

/// Login material for the remote store. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    database: String,
    login: String,
    secret: String,
}

impl Credentials {
    pub fn new(database: impl Into<String>, login: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials {
            database: database.into(),
            login: login.into(),
            secret: secret.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("database", &self.database)
            .field("login", &self.login)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Auth Failure
// =============================================================================

/// Why a handshake didn't yield a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// Connect error, timeout, 5xx or an unexpected status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// 401/403, an error envelope, or a falsy uid.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Unparsable body, missing result, or no session credential.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

// =============================================================================
// Session Manager
// =============================================================================

/// Authenticates with fixed credentials on demand.
#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn RemoteApi>,
    credentials: Credentials,
}

impl SessionManager {
    pub fn new(api: Arc<dyn RemoteApi>, credentials: Credentials) -> Self {
        SessionManager { api, credentials }
    }

    /// Runs the handshake once. No retry: the sync loop's next cycle is the
    /// retry.
    pub async fn acquire(&self) -> Result<SessionHandle, AuthFailure> {
        debug!(
            login = %self.credentials.login(),
            database = %self.credentials.database(),
            "Authenticating with remote store"
        );

        match self.api.authenticate(&self.credentials).await {
            Ok(session) => {
                info!(uid = session.uid(), "Authenticated with remote store");
                Ok(session)
            }
            Err(failure) => {
                warn!(error = %failure, "Authentication failed");
                Err(failure)
            }
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
