//! Shared test fixtures: an in-memory remote store and a scripted source.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use tally_core::{FieldMapping, Money, RemoteId, SessionHandle, VendorAggregate};
use tally_sync::{
    AuthFailure, Credentials, Domain, FieldValues, InvoiceSource, RecordGateway, Reconciler, RemoteApi,
    SyncError, SyncResult,
};

pub const MODEL: &str = "x_client_invoice_total";
pub const VENDOR: &str = "x_client_name";
pub const AMOUNT: &str = "x_total_amount";
pub const COUNT: &str = "x_invoice_count";

/// Every remote method the engine invoked, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticate,
    Search,
    SearchRead,
    Create(String),
    Write(Vec<i64>),
    Unlink(Vec<i64>),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self, Call::Create(_) | Call::Write(_) | Call::Unlink(_))
    }
}

#[derive(Default)]
struct State {
    records: BTreeMap<i64, FieldValues>,
    next_id: i64,
    calls: Vec<Call>,
    reject_auth: bool,
    fail_vendors: HashSet<String>,
    fail_search: bool,
    fail_unlink: bool,
}

/// In-memory stand-in for the remote store.
#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<State>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        let remote = FakeRemote::default();
        remote.state.lock().unwrap().next_id = 1;
        remote
    }

    /// Inserts a record directly, bypassing the call log.
    pub fn seed(&self, vendor: &str, amount: f64, count: Option<i64>) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;

        let mut values = FieldValues::new();
        values.insert(VENDOR.into(), Value::String(vendor.into()));
        values.insert(AMOUNT.into(), serde_json::json!(amount));
        if let Some(count) = count {
            values.insert(COUNT.into(), Value::from(count));
        }
        state.records.insert(id, values);
        id
    }

    pub fn reject_auth(&self) {
        self.state.lock().unwrap().reject_auth = true;
    }

    /// Makes every create/write for `vendor` fail.
    pub fn fail_writes_for(&self, vendor: &str) {
        self.state.lock().unwrap().fail_vendors.insert(vendor.to_string());
    }

    pub fn fail_search(&self) {
        self.state.lock().unwrap().fail_search = true;
    }

    pub fn fail_unlink(&self) {
        self.state.lock().unwrap().fail_unlink = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn write_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.is_write()).count()
    }

    /// `(id, vendor, amount in cents, count)` for every stored record.
    pub fn snapshot(&self) -> Vec<(i64, String, i64, Option<i64>)> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|(id, values)| {
                let vendor = values.get(VENDOR).and_then(Value::as_str).unwrap_or("").to_string();
                let amount = values.get(AMOUNT).map(|v| v.to_string()).unwrap_or_else(|| "0".into());
                let cents = Money::from_decimal_str(&amount).unwrap().cents();
                let count = values.get(COUNT).and_then(Value::as_i64);
                (*id, vendor, cents, count)
            })
            .collect()
    }

    fn matches(values: &FieldValues, domain: &Domain) -> bool {
        domain
            .terms()
            .iter()
            .all(|(field, op, expected)| op == "=" && values.get(field) == Some(expected))
    }

    fn vendor_of(values: &FieldValues) -> String {
        values.get(VENDOR).and_then(Value::as_str).unwrap_or("").to_string()
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<SessionHandle, AuthFailure> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Authenticate);
        if state.reject_auth {
            return Err(AuthFailure::InvalidCredentials("uid is false".into()));
        }
        Ok(SessionHandle::new("fake-session", 2))
    }

    async fn search(&self, _session: &SessionHandle, _model: &str, domain: &Domain) -> SyncResult<Vec<RemoteId>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Search);
        if state.fail_search {
            return Err(SyncError::Transport("connection reset".into()));
        }
        Ok(state
            .records
            .iter()
            .filter(|(_, values)| Self::matches(values, domain))
            .map(|(id, _)| RemoteId::new(*id))
            .collect())
    }

    async fn search_read(
        &self,
        _session: &SessionHandle,
        _model: &str,
        domain: &Domain,
        fields: &[String],
    ) -> SyncResult<Vec<FieldValues>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::SearchRead);
        if state.fail_search {
            return Err(SyncError::Transport("connection reset".into()));
        }
        Ok(state
            .records
            .iter()
            .filter(|(_, values)| Self::matches(values, domain))
            .map(|(id, values)| {
                let mut row = FieldValues::new();
                row.insert("id".into(), Value::from(*id));
                for field in fields.iter().filter(|f| f.as_str() != "id") {
                    row.insert(field.clone(), values.get(field).cloned().unwrap_or(Value::Bool(false)));
                }
                row
            })
            .collect())
    }

    async fn create(&self, _session: &SessionHandle, _model: &str, values: FieldValues) -> SyncResult<RemoteId> {
        let mut state = self.state.lock().unwrap();
        let vendor = Self::vendor_of(&values);
        state.calls.push(Call::Create(vendor.clone()));
        if state.fail_vendors.contains(&vendor) {
            return Err(SyncError::RemoteFault {
                code: 200,
                message: format!("constraint violated for {}", vendor),
            });
        }
        let id = state.next_id;
        state.next_id += 1;
        state.records.insert(id, values);
        Ok(RemoteId::new(id))
    }

    async fn write(
        &self,
        _session: &SessionHandle,
        _model: &str,
        ids: &[RemoteId],
        values: FieldValues,
    ) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Write(ids.iter().map(|id| id.get()).collect()));
        if state.fail_vendors.contains(&Self::vendor_of(&values)) {
            return Err(SyncError::WriteRejected {
                model: MODEL.into(),
                method: "write".into(),
            });
        }
        for id in ids {
            let record = state
                .records
                .get_mut(&id.get())
                .ok_or_else(|| SyncError::RemoteFault {
                    code: 200,
                    message: "record does not exist".into(),
                })?;
            for (field, value) in &values {
                record.insert(field.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn unlink(&self, _session: &SessionHandle, _model: &str, ids: &[RemoteId]) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Unlink(ids.iter().map(|id| id.get()).collect()));
        if state.fail_unlink {
            return Err(SyncError::HttpStatus {
                status: 503,
                body: "maintenance".into(),
            });
        }
        for id in ids {
            state.records.remove(&id.get());
        }
        Ok(())
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Serves a fixed aggregate set and counts fetches.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    aggregates: Arc<Mutex<Vec<VendorAggregate>>>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(aggregates: Vec<VendorAggregate>) -> Self {
        ScriptedSource {
            aggregates: Arc::new(Mutex::new(aggregates)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set(&self, aggregates: Vec<VendorAggregate>) {
        *self.aggregates.lock().unwrap() = aggregates;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InvoiceSource for ScriptedSource {
    async fn fetch(&self) -> SyncResult<Vec<VendorAggregate>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.aggregates.lock().unwrap().clone())
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

/// Panics on the first fetch, then behaves.
pub struct PanicOnceSource {
    inner: ScriptedSource,
    panicked: AtomicUsize,
}

impl PanicOnceSource {
    pub fn new(inner: ScriptedSource) -> Self {
        PanicOnceSource {
            inner,
            panicked: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InvoiceSource for PanicOnceSource {
    async fn fetch(&self) -> SyncResult<Vec<VendorAggregate>> {
        if self.panicked.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("source exploded");
        }
        self.inner.fetch().await
    }

    fn describe(&self) -> String {
        "panic-once".into()
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn aggregate(vendor: &str, count: i64, amount: &str) -> VendorAggregate {
    VendorAggregate::new(vendor, Some(count), amount.parse().unwrap()).unwrap()
}

pub fn mapping(with_count: bool) -> FieldMapping {
    FieldMapping::new(MODEL, VENDOR, AMOUNT, with_count.then_some(COUNT)).unwrap()
}

pub fn reconciler(remote: &FakeRemote, with_count: bool) -> Reconciler {
    let api: Arc<dyn RemoteApi> = Arc::new(remote.clone());
    Reconciler::new(RecordGateway::new(api, Arc::new(mapping(with_count))))
}

pub fn session() -> SessionHandle {
    SessionHandle::new("fake-session", 2)
}

pub fn credentials() -> Credentials {
    Credentials::new("prod", "sync@example.com", "hunter2")
}
