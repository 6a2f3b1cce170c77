//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Source      │  │    Remote write         │ │
//! │  │  (fatal)        │  │  (fail closed)  │  │  (per vendor)           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  SourceAccess   │  │  RemoteFault            │ │
//! │  │  MissingConfig  │  │                 │  │  HttpStatus             │ │
//! │  │  ConfigLoad...  │  │                 │  │  WriteRejected          │ │
//! │  └─────────────────┘  └─────────────────┘  │  MalformedResponse      │ │
//! │                                            └─────────────────────────┘ │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Authentication │  │   Transport     │                              │
//! │  │  (skip cycle)   │  │  (retryable)    │                              │
//! │  │                 │  │                 │                              │
//! │  │  Authentication │  │  Timeout        │                              │
//! │  │                 │  │  Transport      │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::session::AuthFailure;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// A configuration value is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required configuration value is absent.
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Source Errors
    // =========================================================================
    /// The invoice source couldn't be read.
    #[error("Source access failed: {0}")]
    SourceAccess(String),

    // =========================================================================
    // Authentication Errors
    // =========================================================================
    /// The remote handshake failed.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthFailure),

    // =========================================================================
    // Remote Write Errors
    // =========================================================================
    /// The remote answered with a JSON-RPC error envelope.
    #[error("Remote fault {code}: {message}")]
    RemoteFault { code: i64, message: String },

    /// The remote answered with a non-success HTTP status.
    #[error("Remote returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The remote accepted the call but reported it did nothing.
    #[error("Remote rejected {method} on {model}")]
    WriteRejected { model: String, method: String },

    /// The response body wasn't the shape expected.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// An I/O deadline expired.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Connection-level failure (refused, reset, DNS, TLS).
    #[error("Transport error: {0}")]
    Transport(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<tally_db::DbError> for SyncError {
    fn from(err: tally_db::DbError) -> Self {
        SyncError::SourceAccess(err.to_string())
    }
}

impl From<tally_core::CoreError> for SyncError {
    fn from(err: tally_core::CoreError) -> Self {
        SyncError::InvalidConfig(err.to_string())
    }
}

impl From<tally_core::ValidationError> for SyncError {
    fn from(err: tally_core::ValidationError) -> Self {
        SyncError::InvalidConfig(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidConfig(format!("invalid URL: {}", err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::MalformedResponse(err.to_string())
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedResponse(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the next cycle may well succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Timeout(_)
                | SyncError::Transport(_)
                | SyncError::SourceAccess(_)
                | SyncError::HttpStatus { status: 500..=599, .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_) | SyncError::MissingConfig(_) | SyncError::ConfigLoadFailed(_)
        )
    }
}
