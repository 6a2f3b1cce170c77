//! # Record Gateway
//!
//! Maps between domain values and the configured remote model.
//!
//! ```text
//! VendorAggregate { "Acme", 3, 450.00 }
//!        │  to_values()
//!        ▼
//! { "x_client_name": "Acme", "x_total_amount": 450.0, "x_invoice_count": 3 }
//!        │  RemoteApi::create / write
//!        ▼
//! remote store ── search_read ──► { "id": 7, "x_client_name": "Acme", ... }
//!                                        │  record_from_row()
//!                                        ▼
//!                             RemoteRecord { 7, "Acme", 450.00, Some(3) }
//! ```
//!
//! Amounts leave as JSON numbers and come back as whatever the server
//! stored; they're rounded half-even to cents on the way in so comparison
//! never touches floating point.

use std::sync::Arc;

use serde_json::{Number, Value};

use tally_core::{FieldMapping, Money, RemoteId, RemoteRecord, SessionHandle, VendorAggregate};

use crate::error::{SyncError, SyncResult};
use crate::remote::{Domain, FieldValues, RemoteApi};

/// Typed access to the mapped remote model.
#[derive(Clone)]
pub struct RecordGateway {
    api: Arc<dyn RemoteApi>,
    mapping: Arc<FieldMapping>,
}

impl RecordGateway {
    pub fn new(api: Arc<dyn RemoteApi>, mapping: Arc<FieldMapping>) -> Self {
        RecordGateway { api, mapping }
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Records whose vendor field equals `vendor` exactly, lowest id first.
    pub async fn find_by_vendor(&self, session: &SessionHandle, vendor: &str) -> SyncResult<Vec<RemoteRecord>> {
        let domain = Domain::eq(&self.mapping.vendor_field, vendor);
        self.read(session, &domain).await
    }

    /// Every record of the model, lowest id first.
    pub async fn read_all(&self, session: &SessionHandle) -> SyncResult<Vec<RemoteRecord>> {
        self.read(session, &Domain::all()).await
    }

    /// Ids of every record of the model.
    pub async fn all_ids(&self, session: &SessionHandle) -> SyncResult<Vec<RemoteId>> {
        self.api.search(session, &self.mapping.model, &Domain::all()).await
    }

    pub async fn create(&self, session: &SessionHandle, aggregate: &VendorAggregate) -> SyncResult<RemoteId> {
        self.api
            .create(session, &self.mapping.model, self.to_values(aggregate))
            .await
    }

    pub async fn update(&self, session: &SessionHandle, id: RemoteId, aggregate: &VendorAggregate) -> SyncResult<()> {
        self.api
            .write(session, &self.mapping.model, &[id], self.to_values(aggregate))
            .await
    }

    pub async fn delete(&self, session: &SessionHandle, ids: &[RemoteId]) -> SyncResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.api.unlink(session, &self.mapping.model, ids).await
    }

    async fn read(&self, session: &SessionHandle, domain: &Domain) -> SyncResult<Vec<RemoteRecord>> {
        let rows = self
            .api
            .search_read(session, &self.mapping.model, domain, &self.mapping.read_fields())
            .await?;

        let mut records = rows
            .iter()
            .map(|row| self.record_from_row(row))
            .collect::<SyncResult<Vec<_>>>()?;
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    /// Field values for create/write.
    ///
    /// The count is only sent when a count field is mapped and the aggregate
    /// has one.
    pub fn to_values(&self, aggregate: &VendorAggregate) -> FieldValues {
        let mut values = FieldValues::new();
        values.insert(
            self.mapping.vendor_field.clone(),
            Value::String(aggregate.vendor_name.clone()),
        );
        values.insert(self.mapping.amount_field.clone(), amount_value(aggregate.total_amount));

        if let (Some(field), Some(count)) = (&self.mapping.count_field, aggregate.invoice_count) {
            values.insert(field.clone(), Value::from(count));
        }

        values
    }

    /// Reads one `search_read` row back into a [`RemoteRecord`].
    pub fn record_from_row(&self, row: &FieldValues) -> SyncResult<RemoteRecord> {
        let id = row
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| SyncError::MalformedResponse("record without integer id".into()))?;

        // Unset fields come back as `false`.
        let vendor = match row.get(&self.mapping.vendor_field) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        let amount = match row.get(&self.mapping.amount_field) {
            Some(Value::Number(n)) => parse_amount(&n.to_string())?,
            Some(Value::String(s)) => parse_amount(s)?,
            _ => Money::zero(),
        };

        let count = self
            .mapping
            .count_field
            .as_ref()
            .and_then(|field| row.get(field))
            .and_then(Value::as_i64);

        Ok(RemoteRecord {
            id: RemoteId::new(id),
            vendor,
            amount,
            count,
        })
    }
}

fn amount_value(amount: Money) -> Value {
    Number::from_f64(amount.to_decimal_f64())
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(amount.to_decimal_string()))
}

fn parse_amount(raw: &str) -> SyncResult<Money> {
    Money::from_decimal_str(raw).map_err(|e| SyncError::MalformedResponse(e.to_string()))
}
