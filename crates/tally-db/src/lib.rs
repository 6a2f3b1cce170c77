//! # tally-db: Source Database Layer for Tally
//!
//! This crate provides read access to the invoice source database.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  SyncLoop cycle (tally-sync)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqlInvoiceSource::fetch                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────────────────────┐     │   │
//! │  │   │   Database    │    │        Repositories             │     │   │
//! │  │   │   (pool.rs)   │◄───│  InvoiceRepository::vendor_totals│     │   │
//! │  │   │ lazy pool     │    │  one GROUP BY per cycle          │     │   │
//! │  │   └───────────────┘    └─────────────────────────────────┘     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               SQLite source database (read only)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_core::SourceLayout;
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::connect_lazy(DbConfig::new("sqlite://invoices.db"))?;
//! let totals = db.invoices().vendor_totals(&SourceLayout::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::invoice::InvoiceRepository;
