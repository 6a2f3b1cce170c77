//! # Reconciler
//!
//! Decides, per vendor, what to write so the remote store matches the
//! aggregate set.
//!
//! ## Strategies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPSERT BY KEY (default)                                                │
//! │  ───────────────────────                                                │
//! │  for each aggregate:                                                    │
//! │     search_read [vendor_field = name]                                   │
//! │       ├── none found        ──► create                 (created)        │
//! │       ├── same amount/count ──► nothing                (unchanged)      │
//! │       └── different         ──► write lowest id        (updated)        │
//! │                                                                         │
//! │  REPLACE ALL                                                            │
//! │  ───────────                                                            │
//! │  search [] ──► unlink all ──► create one per aggregate                  │
//! │     │              │                                                    │
//! │     └──────────────┴── failure: no creates, every vendor failed         │
//! │                                                                         │
//! │  Not atomic: a failure part way through the create phase leaves the    │
//! │  store with fewer records than the source until the next cycle.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure on one vendor is logged and counted; the others still run.
//! Retrying is the sync loop's job, not this one's.

use tracing::{debug, error, info, warn};

use tally_core::{ReconcileStrategy, SessionHandle, SyncReport, VendorAggregate};

use crate::records::RecordGateway;

/// Applies an aggregate set to the remote store.
#[derive(Clone)]
pub struct Reconciler {
    gateway: RecordGateway,
}

impl Reconciler {
    pub fn new(gateway: RecordGateway) -> Self {
        Reconciler { gateway }
    }

    pub fn gateway(&self) -> &RecordGateway {
        &self.gateway
    }

    /// Runs one reconcile pass. Never fails as a whole; failures are in the
    /// report.
    pub async fn reconcile(
        &self,
        session: &SessionHandle,
        aggregates: &[VendorAggregate],
        strategy: ReconcileStrategy,
    ) -> SyncReport {
        debug!(%strategy, vendors = aggregates.len(), "Reconciling");

        let report = match strategy {
            ReconcileStrategy::UpsertByKey => self.upsert(session, aggregates).await,
            ReconcileStrategy::ReplaceAll => self.replace_all(session, aggregates).await,
        };

        info!(
            %strategy,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            failed = report.failed,
            "Reconcile finished"
        );
        report
    }

    // =========================================================================
    // Upsert
    // =========================================================================

    async fn upsert(&self, session: &SessionHandle, aggregates: &[VendorAggregate]) -> SyncReport {
        let compare_count = self.gateway.mapping().count_field.is_some();
        let mut report = SyncReport::default();

        for aggregate in aggregates {
            let vendor = aggregate.vendor_name.as_str();

            let existing = match self.gateway.find_by_vendor(session, vendor).await {
                Ok(records) => records,
                Err(e) => {
                    error!(%vendor, retryable = e.is_retryable(), error = %e, "Lookup failed");
                    report.record_failure(vendor);
                    continue;
                }
            };

            let Some(target) = existing.first() else {
                match self.gateway.create(session, aggregate).await {
                    Ok(id) => {
                        info!(%vendor, %id, amount = %aggregate.total_amount, "Created");
                        report.created += 1;
                    }
                    Err(e) => {
                        error!(%vendor, retryable = e.is_retryable(), error = %e, "Create failed");
                        report.record_failure(vendor);
                    }
                }
                continue;
            };

            if existing.len() > 1 {
                warn!(
                    %vendor,
                    count = existing.len(),
                    kept = %target.id,
                    "Several remote records share this vendor; updating the lowest id"
                );
            }

            if target.matches(aggregate, compare_count) {
                debug!(%vendor, id = %target.id, "Unchanged");
                report.unchanged += 1;
                continue;
            }

            match self.gateway.update(session, target.id, aggregate).await {
                Ok(()) => {
                    info!(
                        %vendor,
                        id = %target.id,
                        from = %target.amount,
                        to = %aggregate.total_amount,
                        "Updated"
                    );
                    report.updated += 1;
                }
                Err(e) => {
                    error!(%vendor, id = %target.id, retryable = e.is_retryable(), error = %e, "Update failed");
                    report.record_failure(vendor);
                }
            }
        }

        report
    }

    // =========================================================================
    // Replace All
    // =========================================================================

    async fn replace_all(&self, session: &SessionHandle, aggregates: &[VendorAggregate]) -> SyncReport {
        let mut report = SyncReport::default();

        let purge = match self.gateway.all_ids(session).await {
            Ok(ids) => self.gateway.delete(session, &ids).await.map(|()| ids.len()),
            Err(e) => Err(e),
        };

        match purge {
            Ok(deleted) => {
                info!(deleted, "Purged remote records");
                report.deleted = deleted;
            }
            Err(e) => {
                error!(retryable = e.is_retryable(), error = %e, "Purge failed; skipping creates");
                for aggregate in aggregates {
                    report.record_failure(&aggregate.vendor_name);
                }
                return report;
            }
        }

        for aggregate in aggregates {
            let vendor = aggregate.vendor_name.as_str();
            match self.gateway.create(session, aggregate).await {
                Ok(id) => {
                    info!(%vendor, %id, amount = %aggregate.total_amount, "Created");
                    report.created += 1;
                }
                Err(e) => {
                    error!(%vendor, retryable = e.is_retryable(), error = %e, "Create failed");
                    report.record_failure(vendor);
                }
            }
        }

        report
    }
}
