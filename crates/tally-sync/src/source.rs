//! # Invoice Sources
//!
//! Where each cycle's aggregates come from.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SourceAggregator                                 │
//! │                  (fail closed: error → empty set)                       │
//! │                              │                                          │
//! │               ┌──────────────┴──────────────┐                           │
//! │               ▼                             ▼                           │
//! │     ┌───────────────────┐        ┌─────────────────────┐                │
//! │     │  SqlInvoiceSource │        │   HttpInvoiceFeed   │                │
//! │     │  sqlite:...       │        │   http(s)://...     │                │
//! │     │  GROUP BY in SQL  │        │   GET JSON array,   │                │
//! │     │                   │        │   aggregate here    │                │
//! │     └───────────────────┘        └─────────────────────┘                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};
use url::Url;

use tally_core::aggregate::{aggregate_invoices, InvoiceRow};
use tally_core::{Money, SourceLayout, VendorAggregate};
use tally_db::{Database, DbConfig};

use crate::config::{SourceKind, SyncConfig};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Source Trait
// =============================================================================

/// Something that can produce the current per-vendor totals.
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    /// Reads the source and returns aggregates ordered by vendor name.
    async fn fetch(&self) -> SyncResult<Vec<VendorAggregate>>;

    /// Short description for logs (never includes credentials).
    fn describe(&self) -> String;
}

/// Builds the source the configuration points at.
///
/// The SQL pool is created lazily, so an unreachable database only shows up
/// as a failed fetch.
pub fn build_source(config: &SyncConfig) -> SyncResult<Box<dyn InvoiceSource>> {
    let url = config.source_url()?;

    match config.source_kind()? {
        SourceKind::Sql => {
            let db_config = DbConfig::new(url)
                .acquire_timeout(config.connect_timeout())
                .query_timeout(config.request_timeout());
            let db = Database::connect_lazy(db_config)?;
            Ok(Box::new(SqlInvoiceSource::new(db, config.source_layout()?)))
        }
        SourceKind::HttpFeed => {
            let feed = HttpInvoiceFeed::new(Url::parse(url)?, config.request_timeout(), config.connect_timeout())?;
            Ok(Box::new(feed))
        }
    }
}

// =============================================================================
// SQL Source
// =============================================================================

/// Aggregates inside the source database with one query.
pub struct SqlInvoiceSource {
    db: Database,
    layout: SourceLayout,
}

impl SqlInvoiceSource {
    pub fn new(db: Database, layout: SourceLayout) -> Self {
        SqlInvoiceSource { db, layout }
    }
}

#[async_trait]
impl InvoiceSource for SqlInvoiceSource {
    async fn fetch(&self) -> SyncResult<Vec<VendorAggregate>> {
        Ok(self.db.invoices().vendor_totals(&self.layout).await?)
    }

    fn describe(&self) -> String {
        format!("sql table '{}'", self.layout.table)
    }
}

// =============================================================================
// HTTP Feed Source
// =============================================================================

/// One invoice as served by the feed.
///
/// The vendor may be named `client_name` or `vendor_name`; the amount may be
/// a JSON number or a decimal string.
#[derive(Debug, Deserialize)]
struct FeedInvoice {
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    vendor_name: Option<String>,
    #[serde(default)]
    amount: Option<FeedAmount>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedAmount {
    Number(serde_json::Number),
    Text(String),
}

impl FeedInvoice {
    fn into_row(self) -> SyncResult<InvoiceRow> {
        let vendor = self.client_name.or(self.vendor_name).unwrap_or_default();
        let amount = match self.amount {
            Some(FeedAmount::Number(n)) => Money::from_decimal_str(&n.to_string()),
            Some(FeedAmount::Text(s)) => Money::from_decimal_str(&s),
            None => Ok(Money::zero()),
        }
        .map_err(|e| SyncError::SourceAccess(format!("invoice for '{}': {}", vendor.trim(), e)))?;

        Ok(InvoiceRow::new(vendor, amount))
    }
}

/// Fetches raw invoices over HTTP and aggregates them in process.
pub struct HttpInvoiceFeed {
    client: Client,
    url: Url,
}

impl HttpInvoiceFeed {
    pub fn new(url: Url, request_timeout: Duration, connect_timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpInvoiceFeed { client, url })
    }
}

#[async_trait]
impl InvoiceSource for HttpInvoiceFeed {
    async fn fetch(&self) -> SyncResult<Vec<VendorAggregate>> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| SyncError::SourceAccess(format!("invoice feed request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::SourceAccess(format!(
                "invoice feed returned HTTP {}",
                status.as_u16()
            )));
        }

        let invoices: Vec<FeedInvoice> = response
            .json()
            .await
            .map_err(|e| SyncError::SourceAccess(format!("invoice feed body: {}", e)))?;

        debug!(invoices = invoices.len(), "Invoice feed fetched");

        let rows = invoices
            .into_iter()
            .map(FeedInvoice::into_row)
            .collect::<SyncResult<Vec<_>>>()?;

        aggregate_invoices(rows).map_err(|e| SyncError::SourceAccess(format!("invoice feed: {}", e)))
    }

    fn describe(&self) -> String {
        format!(
            "invoice feed {}://{}{}",
            self.url.scheme(),
            self.url.host_str().unwrap_or(""),
            self.url.path()
        )
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Wraps a source with the fail-closed contract.
pub struct SourceAggregator {
    source: Box<dyn InvoiceSource>,
}

impl SourceAggregator {
    pub fn new(source: Box<dyn InvoiceSource>) -> Self {
        SourceAggregator { source }
    }

    /// Current totals, or an empty set if the source can't be read.
    ///
    /// Never returns an error: an empty result makes the loop skip
    /// reconciliation, which is the safe outcome for a failed read.
    pub async fn fetch_totals(&self) -> Vec<VendorAggregate> {
        match self.source.fetch().await {
            Ok(totals) => {
                info!(source = %self.source.describe(), vendors = totals.len(), "Fetched vendor totals");
                totals
            }
            Err(e) => {
                error!(source = %self.source.describe(), error = %e, "Source read failed; treating as empty");
                Vec::new()
            }
        }
    }
}
