//! # Database Pool Management
//!
//! Connection pool creation and configuration for the SQLite source.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Daemon startup                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(url) ← Configure pool settings                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::connect_lazy(config) ← No connection opened yet             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐                        │  (max_connections)        │
//! │  │  │Conn1│ │Conn2│  opened on first use   │                           │
//! │  │  └─────┘ └─────┘                        │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ One aggregate query per cycle                                  │
//! │       ▼                                                                 │
//! │  acquire (bounded) ──► query (bounded) ──► rows                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lazy Connect
//! A source database that is down when the daemon starts must not stop it:
//! the first failing cycle logs the error and the next one tries again.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::invoice::InvoiceRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("sqlite://invoices.db")
///     .max_connections(2)
///     .query_timeout(Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// sqlx connection string (`sqlite://path`, `sqlite::memory:`).
    pub url: String,

    /// Maximum number of connections in the pool.
    /// Default: 2 (one query per cycle)
    pub max_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 10 seconds
    pub acquire_timeout: Duration,

    /// Upper bound for a single query.
    /// Default: 30 seconds
    pub query_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,
}

impl DbConfig {
    /// Creates a new database configuration for the given connection string.
    pub fn new(url: impl Into<String>) -> Self {
        DbConfig {
            url: url.into(),
            max_connections: 2,
            acquire_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the per-query timeout.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    pub fn in_memory() -> Self {
        DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1, // In-memory requires single connection
            acquire_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Source database handle providing repository access.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl Database {
    /// Builds the pool without opening a connection.
    ///
    /// Only a malformed connection string fails here.
    pub fn connect_lazy(config: DbConfig) -> DbResult<Self> {
        let connect_options = Self::connect_options(&config)?;
        let pool = Self::pool_options(&config).connect_lazy_with(connect_options);

        info!(
            max_connections = config.max_connections,
            "Source database pool created (lazy)"
        );

        Ok(Database {
            pool,
            query_timeout: config.query_timeout,
        })
    }

    /// Builds the pool and opens a connection immediately.
    ///
    /// Used by tests, where the in-memory database must exist before the
    /// fixture tables are created.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let connect_options = Self::connect_options(&config)?;
        let pool = Self::pool_options(&config)
            .min_connections(1)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Source database pool created"
        );

        Ok(Database {
            pool,
            query_timeout: config.query_timeout,
        })
    }

    fn connect_options(config: &DbConfig) -> DbResult<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            // The source belongs to someone else; never create it.
            .create_if_missing(false)
            .read_only(!config.url.contains(":memory:"));

        debug!("Connection options configured");
        Ok(options)
    }

    fn pool_options(config: &DbConfig) -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the invoice repository.
    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone(), self.query_timeout)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
