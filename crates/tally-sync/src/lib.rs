//! # tally-sync: Reconciliation Sync Engine for Tally
//!
//! This crate keeps a remote record store (an Odoo-style JSON-RPC server) in
//! line with per-vendor invoice totals computed from a source store.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncLoop (cycle driver)                     │  │
//! │  │  interval tick ──► one cycle ──► CycleOutcome                    │  │
//! │  │  panics caught per cycle, shutdown via SyncLoopHandle            │  │
//! │  └───────┬─────────────────────┬─────────────────────┬──────────────┘  │
//! │          ▼                     ▼                     ▼                  │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ SessionManager │  │SourceAggregator│  │  Reconciler            │    │
//! │  │                │  │                │  │                        │    │
//! │  │ handshake per  │  │ SQL GROUP BY   │  │ upsert / replace-all   │    │
//! │  │ cycle, no      │  │ or HTTP feed;  │  │ per-vendor isolation   │    │
//! │  │ token cache    │  │ fails closed   │  │ SyncReport             │    │
//! │  └───────┬────────┘  └────────────────┘  └───────────┬────────────┘    │
//! │          │                                           ▼                  │
//! │          │                               ┌────────────────────────┐    │
//! │          │                               │  RecordGateway         │    │
//! │          │                               │  FieldMapping ⇄ JSON   │    │
//! │          │                               └───────────┬────────────┘    │
//! │          ▼                                           ▼                  │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │           dyn RemoteApi  (OdooRpcClient over reqwest)            │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Layered configuration (defaults, TOML, `TALLY_*` env)
//! - [`error`] - Sync error types
//! - [`remote`] - The `RemoteApi` trait and search domains
//! - [`rpc`] - JSON-RPC client
//! - [`session`] - Credentials, `AuthFailure`, `SessionManager`
//! - [`source`] - Invoice sources and the fail-closed aggregator
//! - [`records`] - Field mapping between aggregates and remote records
//! - [`reconcile`] - The create/update/delete decisions
//! - [`sync_loop`] - Cycle driver
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_sync::{SyncConfig, SyncLoop};
//!
//! let config = SyncConfig::load(None)?;
//! let (sync_loop, handle) = SyncLoop::from_config(&config)?;
//! tokio::spawn(async move { shutdown_signal().await; handle.shutdown().await });
//! sync_loop.run().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod reconcile;
pub mod records;
pub mod remote;
pub mod rpc;
pub mod session;
pub mod source;
pub mod sync_loop;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{SourceKind, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use reconcile::Reconciler;
pub use records::RecordGateway;
pub use remote::{Domain, FieldValues, RemoteApi};
pub use rpc::{OdooRpcClient, RpcTimeouts};
pub use session::{AuthFailure, Credentials, SessionManager};
pub use source::{build_source, HttpInvoiceFeed, InvoiceSource, SourceAggregator, SqlInvoiceSource};
pub use sync_loop::{CycleOutcome, LoopSettings, SyncLoop, SyncLoopHandle};
