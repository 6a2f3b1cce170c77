//! # Sync Loop
//!
//! Drives reconciliation cycles on a fixed interval.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          One Sync Cycle                                 │
//! │                                                                         │
//! │  1. SessionManager::acquire                                            │
//! │       └── failure ──► AuthenticationFailed (source not queried)        │
//! │  2. SourceAggregator::fetch_totals                                     │
//! │       └── empty   ──► NoAggregates (zero remote calls)                 │
//! │  3. Reconciler::reconcile ──► Reconciled(report)                       │
//! │  4. read back (optional) ──► log every remote record                   │
//! │                                                                         │
//! │  A panic anywhere in 1-4 ──► Aborted; the loop keeps going             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pacing
//! The first cycle runs immediately. A cycle that overruns the interval
//! delays the next tick instead of causing a burst. Shutdown is only
//! observed between cycles, so an in-flight cycle always finishes.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use tally_core::{ReconcileStrategy, SessionHandle, SyncReport};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::reconcile::Reconciler;
use crate::records::RecordGateway;
use crate::remote::RemoteApi;
use crate::rpc::{OdooRpcClient, RpcTimeouts};
use crate::session::SessionManager;
use crate::source::{build_source, SourceAggregator};

// =============================================================================
// Settings & Outcome
// =============================================================================

/// Loop behaviour, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub interval: Duration,
    pub max_cycles: Option<u64>,
    pub strategy: ReconcileStrategy,
    pub read_back: bool,
}

impl LoopSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        LoopSettings {
            interval: config.interval(),
            max_cycles: config.sync.max_cycles,
            strategy: config.sync.strategy,
            read_back: config.sync.read_back,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        LoopSettings {
            interval: Duration::from_secs(60),
            max_cycles: None,
            strategy: ReconcileStrategy::default(),
            read_back: false,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No session; nothing else was attempted.
    AuthenticationFailed,
    /// The source was empty or unreadable; nothing was written.
    NoAggregates,
    /// Reconcile ran (possibly with per-vendor failures).
    Reconciled(SyncReport),
    /// The cycle panicked.
    Aborted,
}

// =============================================================================
// Sync Loop
// =============================================================================

/// Owns the engine components and runs cycles.
pub struct SyncLoop {
    sessions: SessionManager,
    source: SourceAggregator,
    reconciler: Reconciler,
    settings: LoopSettings,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running [`SyncLoop`].
#[derive(Clone)]
pub struct SyncLoopHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SyncLoopHandle {
    /// Asks the loop to stop after the current cycle.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::Transport("sync loop already stopped".into()))
    }
}

impl SyncLoop {
    /// Creates a new loop and returns a handle.
    pub fn new(
        sessions: SessionManager,
        source: SourceAggregator,
        reconciler: Reconciler,
        settings: LoopSettings,
    ) -> (Self, SyncLoopHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let sync_loop = SyncLoop {
            sessions,
            source,
            reconciler,
            settings,
            shutdown_rx,
        };

        (sync_loop, SyncLoopHandle { shutdown_tx })
    }

    /// Wires the production components from a validated configuration.
    pub fn from_config(config: &SyncConfig) -> SyncResult<(Self, SyncLoopHandle)> {
        let client = OdooRpcClient::new(
            config.remote_url()?,
            RpcTimeouts {
                request: config.request_timeout(),
                connect: config.connect_timeout(),
            },
        )?;
        let api: Arc<dyn RemoteApi> = Arc::new(client);

        let sessions = SessionManager::new(Arc::clone(&api), config.credentials()?);
        let gateway = RecordGateway::new(api, Arc::new(config.field_mapping()?));
        let source = SourceAggregator::new(build_source(config)?);

        Ok(Self::new(
            sessions,
            source,
            Reconciler::new(gateway),
            LoopSettings::from_config(config),
        ))
    }

    /// Runs cycles until shutdown or `max_cycles`. Returns the number of
    /// cycles run.
    pub async fn run(mut self) -> u64 {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            strategy = %self.settings.strategy,
            max_cycles = ?self.settings.max_cycles,
            "Sync loop starting"
        );

        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles: u64 = 0;

        loop {
            tokio::select! {
                // Shutdown wins over a tick that is ready at the same time.
                biased;

                // A dropped handle disables this branch rather than stopping the loop.
                Some(()) = self.shutdown_rx.recv() => {
                    info!("Sync loop shutting down");
                    break;
                }

                _ = interval.tick() => {
                    cycles += 1;
                    let outcome = self.guarded_cycle(cycles).await;
                    debug!(cycle = cycles, ?outcome, "Cycle complete");

                    if self.settings.max_cycles.is_some_and(|max| cycles >= max) {
                        info!(cycles, "Reached max_cycles");
                        break;
                    }
                }
            }
        }

        info!(cycles, "Sync loop stopped");
        cycles
    }

    /// Runs one cycle, turning a panic into [`CycleOutcome::Aborted`].
    pub async fn guarded_cycle(&self, cycle: u64) -> CycleOutcome {
        match AssertUnwindSafe(self.run_cycle(cycle)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(cycle, panic = %message, "Cycle aborted");
                CycleOutcome::Aborted
            }
        }
    }

    /// Runs one cycle end to end.
    pub async fn run_cycle(&self, cycle: u64) -> CycleOutcome {
        info!(cycle, "Cycle starting");

        let session = match self.sessions.acquire().await {
            Ok(session) => session,
            Err(failure) => {
                warn!(cycle, error = %failure, "Skipping cycle: no session");
                return CycleOutcome::AuthenticationFailed;
            }
        };

        let aggregates = self.source.fetch_totals().await;
        if aggregates.is_empty() {
            info!(cycle, "No aggregates; skipping reconcile");
            return CycleOutcome::NoAggregates;
        }

        let report = self
            .reconciler
            .reconcile(&session, &aggregates, self.settings.strategy)
            .await;

        info!(
            cycle,
            fetched = aggregates.len(),
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            failed = report.failed,
            "Cycle summary"
        );
        if !report.is_clean() {
            warn!(cycle, vendors = ?report.failed_vendors, "Some vendors failed");
        }

        if self.settings.read_back {
            self.read_back(&session).await;
        }

        CycleOutcome::Reconciled(report)
    }

    async fn read_back(&self, session: &SessionHandle) {
        match self.reconciler.gateway().read_all(session).await {
            Ok(records) => {
                info!(records = records.len(), "Records currently in remote store");
                for record in records {
                    info!(
                        id = %record.id,
                        vendor = %record.vendor,
                        amount = %record.amount,
                        count = ?record.count,
                        "Remote record"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Read back failed"),
        }
    }
}
