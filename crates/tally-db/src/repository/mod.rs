//! # Repository Module
//!
//! Read-only repositories over the source database.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqlInvoiceSource (tally-sync)                                         │
//! │       │                                                                 │
//! │       │  db.invoices().vendor_totals(&layout)                          │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  └── vendor_totals(&self, layout) ── one GROUP BY, bounded by timeout  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`invoice::InvoiceRepository`] - Per-vendor invoice totals

pub mod invoice;
