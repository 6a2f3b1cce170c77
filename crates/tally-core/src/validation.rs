//! # Validation Module
//!
//! Input validation utilities for Tally.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Startup (config load)                                        │
//! │  ├── SQL identifiers (table, columns) before they reach a query        │
//! │  └── Remote model/field names                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Per cycle (aggregation)                                      │
//! │  └── Vendor names: trimmed, non-empty                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Remote store                                                 │
//! │  └── Field types, access rights                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{normalize_vendor_name, validate_sql_identifier};
//!
//! assert_eq!(normalize_vendor_name("  Acme  ").as_deref(), Some("Acme"));
//! assert!(validate_sql_identifier("table", "invoices").is_ok());
//! assert!(validate_sql_identifier("table", "invoices; DROP").is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest SQL identifier accepted (PostgreSQL's limit, stricter than SQLite).
pub const MAX_IDENTIFIER_LEN: usize = 63;

// =============================================================================
// Vendor Names
// =============================================================================

/// Trims a vendor name; returns `None` when nothing is left.
///
/// Vendor identity is case-sensitive: `"Acme"` and `"ACME"` are different
/// vendors.
pub fn normalize_vendor_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Validates a SQL identifier that will be interpolated into a query.
///
/// ## Rules
/// - Must not be empty
/// - At most 63 characters
/// - `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_sql_identifier(field: &str, value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    let mut chars = value.chars();
    let starts_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must match [A-Za-z_][A-Za-z0-9_]*".to_string(),
        });
    }

    Ok(())
}

/// Validates a remote model or field name (e.g. `x_client_invoice_total`,
/// `res.partner`).
///
/// Remote model names may contain dots; field names may not, but the check
/// is shared since both end up as plain strings in the RPC payload.
pub fn validate_remote_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, digits, underscores, and dots".to_string(),
        });
    }

    Ok(())
}
