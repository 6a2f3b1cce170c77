//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │ VendorAggregate  │   │  RemoteRecord    │   │  SessionHandle   │    │
//! │  │  ──────────────  │   │  ──────────────  │   │  ──────────────  │    │
//! │  │  vendor_name     │   │  id (RemoteId)   │   │  session_token   │    │
//! │  │  invoice_count?  │   │  vendor          │   │  uid             │    │
//! │  │  total_amount    │   │  amount, count?  │   │  acquired_at     │    │
//! │  └──────────────────┘   └──────────────────┘   └──────────────────┘    │
//! │     source side             remote side           one cycle only       │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │  FieldMapping    │   │  SourceLayout    │   │   SyncReport     │    │
//! │  │  model + fields  │   │  table + columns │   │  per-cycle tally │    │
//! │  └──────────────────┘   └──────────────────┘   └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! A vendor is identified by its trimmed, case-sensitive name. Remote records
//! carry an integer id assigned by the remote store; the local side never
//! invents one.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationError};
use crate::money::Money;
use crate::validation::{normalize_vendor_name, validate_remote_name, validate_sql_identifier};

// =============================================================================
// Vendor Aggregate
// =============================================================================

/// Per-vendor summary derived from raw invoice rows.
///
/// Produced fresh each cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAggregate {
    /// Trimmed, non-empty vendor name. The reconciliation key.
    pub vendor_name: String,

    /// Number of invoices folded into this aggregate, when the source counts.
    pub invoice_count: Option<i64>,

    /// Exact sum of invoice amounts.
    pub total_amount: Money,
}

impl VendorAggregate {
    /// Builds an aggregate, trimming the vendor name.
    ///
    /// Rejects blank names and negative counts.
    pub fn new(
        vendor_name: &str,
        invoice_count: Option<i64>,
        total_amount: Money,
    ) -> Result<Self, ValidationError> {
        let vendor_name =
            normalize_vendor_name(vendor_name).ok_or_else(|| ValidationError::Required {
                field: "vendor_name".to_string(),
            })?;

        if let Some(count) = invoice_count {
            if count < 0 {
                return Err(ValidationError::InvalidFormat {
                    field: "invoice_count".to_string(),
                    reason: format!("must be >= 0, got {}", count),
                });
            }
        }

        Ok(VendorAggregate {
            vendor_name,
            invoice_count,
            total_amount,
        })
    }
}

// =============================================================================
// Remote Records
// =============================================================================

/// Identifier assigned by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(i64);

impl RemoteId {
    #[inline]
    pub const fn new(id: i64) -> Self {
        RemoteId(id)
    }

    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record as read back from the remote store, already mapped out of the
/// configured field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RemoteId,
    pub vendor: String,
    pub amount: Money,
    pub count: Option<i64>,
}

impl RemoteRecord {
    /// Whether this record already holds the aggregate's values.
    ///
    /// The count only participates when `compare_count` is set (i.e. a count
    /// field is mapped).
    pub fn matches(&self, aggregate: &VendorAggregate, compare_count: bool) -> bool {
        if self.amount != aggregate.total_amount {
            return false;
        }
        !compare_count || self.count == aggregate.invoice_count
    }
}

// =============================================================================
// Session Handle
// =============================================================================

/// Short-lived credential obtained from the authentication handshake.
///
/// Owned by one cycle and dropped at the end of it. `Debug` never prints the
/// token.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionHandle {
    session_token: String,
    uid: i64,
    acquired_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn new(session_token: impl Into<String>, uid: i64) -> Self {
        SessionHandle {
            session_token: session_token.into(),
            uid,
            acquired_at: Utc::now(),
        }
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_token", &"<redacted>")
            .field("uid", &self.uid)
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}

// =============================================================================
// Field Mapping
// =============================================================================

/// Names of the remote model and fields an aggregate maps onto.
///
/// Built once from configuration and shared for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub model: String,
    pub vendor_field: String,
    pub amount_field: String,
    pub count_field: Option<String>,
}

impl FieldMapping {
    /// Validates and trims every name.
    pub fn new(
        model: &str,
        vendor_field: &str,
        amount_field: &str,
        count_field: Option<&str>,
    ) -> Result<Self, ValidationError> {
        validate_remote_name("model", model)?;
        validate_remote_name("vendor_field", vendor_field)?;
        validate_remote_name("amount_field", amount_field)?;

        let count_field = match count_field.map(str::trim).filter(|f| !f.is_empty()) {
            Some(field) => {
                validate_remote_name("count_field", field)?;
                Some(field.to_string())
            }
            None => None,
        };

        Ok(FieldMapping {
            model: model.trim().to_string(),
            vendor_field: vendor_field.trim().to_string(),
            amount_field: amount_field.trim().to_string(),
            count_field,
        })
    }

    /// Field names to request from `search_read`, `id` first.
    pub fn read_fields(&self) -> Vec<String> {
        let mut fields = vec![
            "id".to_string(),
            self.vendor_field.clone(),
            self.amount_field.clone(),
        ];
        if let Some(count) = &self.count_field {
            fields.push(count.clone());
        }
        fields
    }
}

// =============================================================================
// Source Layout
// =============================================================================

/// Table and column names the aggregate query reads.
///
/// The amount column holds integer cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLayout {
    pub table: String,
    pub vendor_column: String,
    pub amount_column: String,
}

impl SourceLayout {
    /// Validates each identifier before it can reach a SQL string.
    pub fn new(table: &str, vendor_column: &str, amount_column: &str) -> Result<Self, ValidationError> {
        validate_sql_identifier("source.table", table)?;
        validate_sql_identifier("source.vendor_column", vendor_column)?;
        validate_sql_identifier("source.amount_column", amount_column)?;

        Ok(SourceLayout {
            table: table.to_string(),
            vendor_column: vendor_column.to_string(),
            amount_column: amount_column.to_string(),
        })
    }
}

impl Default for SourceLayout {
    fn default() -> Self {
        SourceLayout {
            table: "invoices".to_string(),
            vendor_column: "vendor_name".to_string(),
            amount_column: "amount_cents".to_string(),
        }
    }
}

// =============================================================================
// Reconcile Strategy
// =============================================================================

/// How aggregates are written into the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStrategy {
    /// Delete every remote record for the model, then create one per
    /// aggregate. Not atomic.
    ReplaceAll,

    /// Create-if-absent, update-if-different, keyed by vendor name.
    #[default]
    #[serde(alias = "upsert")]
    UpsertByKey,
}

impl fmt::Display for ReconcileStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileStrategy::ReplaceAll => write!(f, "replace_all"),
            ReconcileStrategy::UpsertByKey => write!(f, "upsert"),
        }
    }
}

impl std::str::FromStr for ReconcileStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upsert" | "upsert_by_key" | "upsert-by-key" => Ok(ReconcileStrategy::UpsertByKey),
            "replace_all" | "replace-all" | "replace" => Ok(ReconcileStrategy::ReplaceAll),
            other => Err(CoreError::UnknownStrategy(other.to_string())),
        }
    }
}

// =============================================================================
// Sync Report
// =============================================================================

/// Outcome counters for one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub failed_vendors: Vec<String>,
}

impl SyncReport {
    /// Counts one vendor as failed.
    pub fn record_failure(&mut self, vendor: &str) {
        self.failed += 1;
        self.failed_vendors.push(vendor.to_string());
    }

    /// Creates plus updates.
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }

    /// True when no vendor failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} deleted={} unchanged={} failed={}",
            self.created, self.updated, self.deleted, self.unchanged, self.failed
        )
    }
}
