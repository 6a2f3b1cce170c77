//! # Invoice Repository
//!
//! The single query the sync engine runs against the source each cycle.
//!
//! ## Aggregate Query
//! ```text
//! SELECT TRIM("vendor"), COUNT(*), SUM("amount")
//!   FROM "table"
//!  WHERE TRIM("vendor") <> ''
//!  GROUP BY TRIM("vendor")
//!  ORDER BY TRIM("vendor")
//! ```
//!
//! Table and column names come from [`SourceLayout`] and are validated as
//! plain identifiers before being quoted into the statement. The amount
//! column holds integer cents, so `SUM` is exact.

use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use tally_core::aggregate::{merge_subtotals, Subtotal};
use tally_core::validation::validate_sql_identifier;
use tally_core::{Money, SourceLayout, VendorAggregate};

/// Repository for invoice reads.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool, query_timeout: Duration) -> Self {
        InvoiceRepository {
            pool,
            query_timeout,
        }
    }

    /// Returns one aggregate per distinct trimmed vendor name, ordered by
    /// name.
    ///
    /// ## Errors
    /// - `QueryFailed` if the table or a column is missing
    /// - `InvalidRow` if the amount column isn't integer cents
    /// - `Timeout` if the query outlives `query_timeout`
    pub async fn vendor_totals(&self, layout: &SourceLayout) -> DbResult<Vec<VendorAggregate>> {
        let sql = aggregate_sql(layout)?;
        debug!(table = %layout.table, "Querying vendor totals");

        let query = sqlx::query_as::<_, (String, i64, Option<i64>)>(&sql).fetch_all(&self.pool);

        let rows = tokio::time::timeout(self.query_timeout, query)
            .await
            .map_err(|_| DbError::Timeout(self.query_timeout))
            .and_then(|result| result.map_err(DbError::from))
            .inspect_err(|e| {
                warn!(
                    table = %layout.table,
                    transient = e.is_transient(),
                    error = %e,
                    "Vendor totals query failed"
                )
            })?;

        // SQLite's TRIM() only strips spaces; re-merge on the full trim.
        let totals = merge_subtotals(
            rows.into_iter()
                .map(|(vendor, count, sum)| Subtotal::new(vendor, count, Money::from_cents(sum.unwrap_or(0)))),
        )
        .map_err(|e| DbError::InvalidRow(e.to_string()))?;

        debug!(vendors = totals.len(), "Vendor totals fetched");
        Ok(totals)
    }
}

/// Builds the aggregate statement for a layout.
fn aggregate_sql(layout: &SourceLayout) -> DbResult<String> {
    for (field, value) in [
        ("source.table", &layout.table),
        ("source.vendor_column", &layout.vendor_column),
        ("source.amount_column", &layout.amount_column),
    ] {
        validate_sql_identifier(field, value).map_err(|e| DbError::QueryFailed(e.to_string()))?;
    }

    let vendor = format!("TRIM(\"{}\")", layout.vendor_column);
    Ok(format!(
        "SELECT {vendor}, COUNT(*), SUM(\"{amount}\") FROM \"{table}\" \
         WHERE {vendor} <> '' GROUP BY {vendor} ORDER BY {vendor}",
        vendor = vendor,
        amount = layout.amount_column,
        table = layout.table,
    ))
}
