//! # tally-core: Pure Domain Logic for Tally
//!
//! This crate holds every piece of the invoice reconciliation domain that
//! can be expressed without I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tally-daemon (binary)                        │   │
//! │  │          config load ──► SyncLoop::run ──► shutdown             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-sync (engine)                          │   │
//! │  │    SessionManager, Reconciler, RecordGateway, SyncLoop          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ aggregate │  │ validation│  │   │
//! │  │   │ Aggregate │  │   Money   │  │  group +  │  │identifiers│  │   │
//! │  │   │  Report   │  │  parsing  │  │    sum    │  │  names    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (VendorAggregate, RemoteRecord, SyncReport, etc.)
//! - [`money`] - Fixed-point money type (integer cents, no floating point sums)
//! - [`aggregate`] - Grouping raw invoices into per-vendor totals
//! - [`error`] - Domain error types
//! - [`validation`] - Name and identifier validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::aggregate::{aggregate_invoices, InvoiceRow};
//! use tally_core::money::Money;
//!
//! let rows = vec![
//!     InvoiceRow::new(" Acme ", Money::from_cents(15000)),
//!     InvoiceRow::new("Acme", Money::from_cents(30000)),
//! ];
//!
//! let totals = aggregate_invoices(rows).unwrap();
//! assert_eq!(totals.len(), 1);
//! assert_eq!(totals[0].total_amount.cents(), 45000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;
