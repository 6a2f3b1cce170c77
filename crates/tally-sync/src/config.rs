//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_REMOTE_URL=https://erp.example.com                           │
//! │     TALLY_STRATEGY=upsert                                              │
//! │     (a local .env is loaded into the environment by the daemon)        │
//! │                                                                         │
//! │  2. TOML Config File (TALLY_CONFIG_FILE)                               │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     table=invoices, interval=60s, strategy=upsert                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [source]
//! url = "sqlite:///var/lib/tally/invoices.db"
//! table = "invoices"
//! vendor_column = "vendor_name"
//! amount_column = "amount_cents"
//!
//! [remote]
//! url = "https://erp.example.com"
//! database = "production"
//! login = "sync@example.com"
//! secret = "..."
//! request_timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [mapping]
//! model = "x_client_invoice_total"
//! vendor_field = "x_studio_client_name"
//! amount_field = "x_studio_total_invoice_amount"
//! count_field = "x_studio_invoice_count"   # optional
//!
//! [sync]
//! strategy = "upsert"   # upsert | replace_all
//! interval_secs = 60
//! max_cycles = 10       # optional; unbounded when absent
//! read_back = false
//! ```
//!
//! A configuration error is fatal: the daemon exits before the first cycle.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use tally_core::{FieldMapping, ReconcileStrategy, SourceLayout};

use crate::error::{SyncError, SyncResult};
use crate::session::Credentials;

/// Environment variable naming the optional TOML file.
pub const CONFIG_FILE_ENV: &str = "TALLY_CONFIG_FILE";

// =============================================================================
// Source Kind
// =============================================================================

/// Which kind of source the connection string points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `sqlite:` connection string, aggregated in SQL.
    Sql,
    /// `http(s)://` invoice feed, aggregated in process.
    HttpFeed,
}

impl SourceKind {
    /// Classifies a source connection string by its scheme.
    pub fn from_url(url: &str) -> SyncResult<Self> {
        let lower = url.trim().to_ascii_lowercase();
        if lower.starts_with("sqlite:") {
            Ok(SourceKind::Sql)
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(SourceKind::HttpFeed)
        } else {
            Err(SyncError::InvalidConfig(format!(
                "Unsupported source URL '{}'. Expected sqlite:, http:// or https://",
                url
            )))
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Where invoices come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub url: Option<String>,
    pub table: String,
    pub vendor_column: String,
    pub amount_column: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        let layout = SourceLayout::default();
        SourceSettings {
            url: None,
            table: layout.table,
            vendor_column: layout.vendor_column,
            amount_column: layout.amount_column,
        }
    }
}

/// The remote record store and how to reach it.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub url: Option<String>,
    pub database: Option<String>,
    pub login: Option<String>,
    pub secret: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            url: None,
            database: None,
            login: None,
            secret: None,
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("login", &self.login)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Remote model and field names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MappingSettings {
    pub model: Option<String>,
    pub vendor_field: Option<String>,
    pub amount_field: Option<String>,
    pub count_field: Option<String>,
}

/// Cycle pacing and reconcile behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub strategy: ReconcileStrategy,
    pub interval_secs: u64,
    pub max_cycles: Option<u64>,
    pub read_back: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            strategy: ReconcileStrategy::default(),
            interval_secs: default_interval(),
            max_cycles: None,
            read_back: false,
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_interval() -> u64 {
    60
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete daemon configuration.
///
/// Built once at startup and shared read-only for the life of the process.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub source: SourceSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub mapping: MappingSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, or `TALLY_CONFIG_FILE`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let path = config_path.or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No config file given, using defaults and environment");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML config file. A named file that doesn't exist is an
    /// error.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        info!(?path, "Loading config from file");
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Parses TOML text.
    pub fn from_toml(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `TALLY_*` overrides read through `lookup`.
    ///
    /// Unparsable numbers, booleans, or strategy names are fatal rather than
    /// ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> SyncResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // Source
        if let Some(url) = get("TALLY_SOURCE_URL") {
            self.source.url = Some(url);
        }
        if let Some(table) = get("TALLY_SOURCE_TABLE") {
            self.source.table = table;
        }
        if let Some(column) = get("TALLY_SOURCE_VENDOR_COLUMN") {
            self.source.vendor_column = column;
        }
        if let Some(column) = get("TALLY_SOURCE_AMOUNT_COLUMN") {
            self.source.amount_column = column;
        }

        // Remote
        if let Some(url) = get("TALLY_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.url = Some(url);
        }
        if let Some(db) = get("TALLY_REMOTE_DB") {
            self.remote.database = Some(db);
        }
        if let Some(login) = get("TALLY_REMOTE_LOGIN") {
            self.remote.login = Some(login);
        }
        if let Some(secret) = lookup("TALLY_REMOTE_SECRET").filter(|s| !s.is_empty()) {
            self.remote.secret = Some(secret);
        }
        if let Some(secs) = get("TALLY_REQUEST_TIMEOUT_SECS") {
            self.remote.request_timeout_secs = parse_number("TALLY_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = get("TALLY_CONNECT_TIMEOUT_SECS") {
            self.remote.connect_timeout_secs = parse_number("TALLY_CONNECT_TIMEOUT_SECS", &secs)?;
        }

        // Mapping
        if let Some(model) = get("TALLY_MODEL") {
            self.mapping.model = Some(model);
        }
        if let Some(field) = get("TALLY_VENDOR_FIELD") {
            self.mapping.vendor_field = Some(field);
        }
        if let Some(field) = get("TALLY_AMOUNT_FIELD") {
            self.mapping.amount_field = Some(field);
        }
        if let Some(field) = get("TALLY_COUNT_FIELD") {
            self.mapping.count_field = Some(field);
        }

        // Sync
        if let Some(strategy) = get("TALLY_STRATEGY") {
            self.sync.strategy = strategy.parse()?;
            debug!(strategy = %self.sync.strategy, "Overriding strategy from environment");
        }
        if let Some(secs) = get("TALLY_SYNC_INTERVAL_SECS") {
            self.sync.interval_secs = parse_number("TALLY_SYNC_INTERVAL_SECS", &secs)?;
        }
        if let Some(cycles) = get("TALLY_MAX_CYCLES") {
            self.sync.max_cycles = Some(parse_number("TALLY_MAX_CYCLES", &cycles)?);
        }
        if let Some(flag) = get("TALLY_READ_BACK") {
            self.sync.read_back = parse_bool("TALLY_READ_BACK", &flag)?;
        }

        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Checks every required value and builds each typed view once so that
    /// the accessors below can't fail after startup.
    pub fn validate(&self) -> SyncResult<()> {
        self.source_kind()?;
        self.source_layout()?;
        self.remote_url()?;
        self.credentials()?;
        self.field_mapping()?;

        if self.remote.request_timeout_secs == 0 || self.remote.connect_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig("timeouts must be greater than 0".into()));
        }
        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig("interval_secs must be greater than 0".into()));
        }
        if self.sync.max_cycles == Some(0) {
            return Err(SyncError::InvalidConfig("max_cycles must be greater than 0".into()));
        }

        Ok(())
    }

    // =========================================================================
    // Typed Views
    // =========================================================================

    /// The source connection string.
    pub fn source_url(&self) -> SyncResult<&str> {
        self.source
            .url
            .as_deref()
            .ok_or(SyncError::MissingConfig("TALLY_SOURCE_URL"))
    }

    pub fn source_kind(&self) -> SyncResult<SourceKind> {
        SourceKind::from_url(self.source_url()?)
    }

    pub fn source_layout(&self) -> SyncResult<SourceLayout> {
        Ok(SourceLayout::new(
            &self.source.table,
            &self.source.vendor_column,
            &self.source.amount_column,
        )?)
    }

    /// The remote base URL, checked to be http(s).
    pub fn remote_url(&self) -> SyncResult<url::Url> {
        let raw = self
            .remote
            .url
            .as_deref()
            .ok_or(SyncError::MissingConfig("TALLY_REMOTE_URL"))?;
        let url = url::Url::parse(raw)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SyncError::InvalidConfig(format!(
                "remote URL must be http or https, got '{}'",
                other
            ))),
        }
    }

    pub fn credentials(&self) -> SyncResult<Credentials> {
        let database = self
            .remote
            .database
            .clone()
            .ok_or(SyncError::MissingConfig("TALLY_REMOTE_DB"))?;
        let login = self
            .remote
            .login
            .clone()
            .ok_or(SyncError::MissingConfig("TALLY_REMOTE_LOGIN"))?;
        let secret = self
            .remote
            .secret
            .clone()
            .ok_or(SyncError::MissingConfig("TALLY_REMOTE_SECRET"))?;
        Ok(Credentials::new(database, login, secret))
    }

    pub fn field_mapping(&self) -> SyncResult<FieldMapping> {
        let model = self
            .mapping
            .model
            .as_deref()
            .ok_or(SyncError::MissingConfig("TALLY_MODEL"))?;
        let vendor_field = self
            .mapping
            .vendor_field
            .as_deref()
            .ok_or(SyncError::MissingConfig("TALLY_VENDOR_FIELD"))?;
        let amount_field = self
            .mapping
            .amount_field
            .as_deref()
            .ok_or(SyncError::MissingConfig("TALLY_AMOUNT_FIELD"))?;

        Ok(FieldMapping::new(
            model,
            vendor_field,
            amount_field,
            self.mapping.count_field.as_deref(),
        )?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.connect_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> SyncResult<T> {
    value
        .parse()
        .map_err(|_| SyncError::InvalidConfig(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> SyncResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SyncError::InvalidConfig(format!(
            "{} must be true or false, got '{}'",
            key, value
        ))),
    }
}
