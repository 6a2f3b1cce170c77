//! # Remote Record Store API
//!
//! The seam between the engine and the remote store.
//!
//! ```text
//! Reconciler ──► RecordGateway ──► dyn RemoteApi ──┬──► OdooRpcClient (HTTP)
//!                                                  └──► in-memory fake (tests)
//! ```
//!
//! Every method is a single round trip. Values cross this boundary as raw
//! JSON keyed by remote field names; mapping to domain types happens in
//! [`crate::records`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use tally_core::{RemoteId, SessionHandle};

use crate::error::SyncResult;
use crate::session::{AuthFailure, Credentials};

/// A record's fields, keyed by remote field name.
pub type FieldValues = Map<String, Value>;

// =============================================================================
// Search Domain
// =============================================================================

/// A conjunction of `[field, operator, value]` terms.
///
/// Serializes to the JSON-RPC domain shape, e.g. `[["x_name", "=", "Acme"]]`.
/// The empty domain matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Domain(Vec<(String, String, Value)>);

impl Domain {
    /// Matches every record.
    pub fn all() -> Self {
        Domain(Vec::new())
    }

    /// Matches records whose `field` equals `value`.
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Domain(vec![(field.to_string(), "=".to_string(), value.into())])
    }

    pub fn terms(&self) -> &[(String, String, Value)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Remote API
// =============================================================================

/// Operations the engine needs from the remote store.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Performs the authentication handshake.
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionHandle, AuthFailure>;

    /// Ids of records matching `domain`.
    async fn search(&self, session: &SessionHandle, model: &str, domain: &Domain) -> SyncResult<Vec<RemoteId>>;

    /// `fields` of records matching `domain`, ordered by id.
    async fn search_read(
        &self,
        session: &SessionHandle,
        model: &str,
        domain: &Domain,
        fields: &[String],
    ) -> SyncResult<Vec<FieldValues>>;

    /// Creates one record and returns its id.
    async fn create(&self, session: &SessionHandle, model: &str, values: FieldValues) -> SyncResult<RemoteId>;

    /// Overwrites `values` on every record in `ids`.
    async fn write(
        &self,
        session: &SessionHandle,
        model: &str,
        ids: &[RemoteId],
        values: FieldValues,
    ) -> SyncResult<()>;

    /// Deletes every record in `ids`.
    async fn unlink(&self, session: &SessionHandle, model: &str, ids: &[RemoteId]) -> SyncResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_domain_serialization() {
        assert_eq!(serde_json::to_value(Domain::all()).unwrap(), json!([]));
        assert_eq!(
            serde_json::to_value(Domain::eq("x_client_name", "Acme")).unwrap(),
            json!([["x_client_name", "=", "Acme"]])
        );
    }
}
