//! # JSON-RPC Client
//!
//! HTTP client for an Odoo-style JSON-RPC endpoint.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request                                                                │
//! │  POST {base}/web/dataset/call_kw/{model}/{method}                      │
//! │  Cookie: session_id=<token>                                            │
//! │  {"jsonrpc": "2.0", "method": "call", "id": "<uuid>",                  │
//! │   "params": {"model": ..., "method": ..., "args": [...], "kwargs": {}}}│
//! │                                                                         │
//! │  Response                                                               │
//! │  {"jsonrpc": "2.0", "id": ..., "result": ...}                          │
//! │  {"jsonrpc": "2.0", "id": ..., "error": {code, message, data}}         │
//! │                                                                         │
//! │  Classification (first match wins)                                     │
//! │  1. transport error / timeout      → Transport / Timeout               │
//! │  2. body has "error"               → RemoteFault (even on HTTP 200)    │
//! │  3. status not 2xx                 → HttpStatus                        │
//! │  4. body unparsable / no "result"  → MalformedResponse                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One `reqwest::Client` (and its connection pool) is reused for every call
//! across cycles. Sessions are not.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use tally_core::{RemoteId, SessionHandle};

use crate::error::{SyncError, SyncResult};
use crate::remote::{Domain, FieldValues, RemoteApi};
use crate::session::{AuthFailure, Credentials};

const AUTHENTICATE_PATH: &str = "web/session/authenticate";
const CALL_KW_PATH: &str = "web/dataset/call_kw";
const SESSION_COOKIE: &str = "session_id";

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Envelope Types
// =============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<P> {
    jsonrpc: &'static str,
    method: &'static str,
    params: P,
    id: String,
}

impl<P> RpcRequest<P> {
    fn call(params: P) -> Self {
        RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params,
            id: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CallKwParams<'a> {
    model: &'a str,
    method: &'a str,
    args: Value,
    kwargs: Value,
}

#[derive(Debug, Serialize)]
struct AuthenticateParams<'a> {
    db: &'a str,
    login: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcErrorBody {
    /// The most specific message available; Odoo puts the useful text in
    /// `data.message` and a generic one in `message`.
    fn describe(&self) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.message.clone())
    }
}

// =============================================================================
// Client
// =============================================================================

/// Per-request and connect deadlines.
#[derive(Debug, Clone, Copy)]
pub struct RpcTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        RpcTimeouts {
            request: Duration::from_secs(30),
            connect: Duration::from_secs(10),
        }
    }
}

/// JSON-RPC client bound to one remote base URL.
#[derive(Debug, Clone)]
pub struct OdooRpcClient {
    client: Client,
    base_url: Url,
}

impl OdooRpcClient {
    /// Builds the client. The base URL may carry a path prefix.
    pub fn new(base_url: Url, timeouts: RpcTimeouts) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(OdooRpcClient {
            client,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Invokes `model.method(*args, **kwargs)` and returns the raw result.
    pub async fn call_kw(
        &self,
        session: &SessionHandle,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SyncResult<Value> {
        let url = self.base_url.join(&format!("{}/{}/{}", CALL_KW_PATH, model, method))?;
        let body = RpcRequest::call(CallKwParams {
            model,
            method,
            args,
            kwargs,
        });

        debug!(%model, %method, "JSON-RPC call");

        let response = self
            .client
            .post(url)
            .header(COOKIE, format!("{}={}", SESSION_COOKIE, session.session_token()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        trace!(%model, %method, status = status.as_u16(), len = bytes.len(), "JSON-RPC response");

        let envelope = serde_json::from_slice::<RpcResponse>(&bytes);

        if let Ok(RpcResponse { error: Some(err), .. }) = &envelope {
            return Err(SyncError::RemoteFault {
                code: err.code,
                message: err.describe(),
            });
        }

        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&bytes)),
            });
        }

        match envelope {
            Ok(RpcResponse { result: Some(result), .. }) => Ok(result),
            Ok(_) => Err(SyncError::MalformedResponse(format!(
                "{}.{}: response has no result",
                model, method
            ))),
            Err(e) => Err(SyncError::MalformedResponse(format!("{}.{}: {}", model, method, e))),
        }
    }

    /// Runs the session handshake.
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionHandle, AuthFailure> {
        let url = self
            .base_url
            .join(AUTHENTICATE_PATH)
            .map_err(|e| AuthFailure::Transport(e.to_string()))?;

        let body = RpcRequest::call(AuthenticateParams {
            db: credentials.database(),
            login: credentials.login(),
            password: credentials.secret(),
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthFailure::InvalidCredentials(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(AuthFailure::Transport(format!("HTTP {}", status.as_u16())));
        }

        let cookie_token = response
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
            .map(|c| c.value().to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AuthFailure::Transport(e.to_string()))?;

        let envelope: RpcResponse =
            serde_json::from_slice(&bytes).map_err(|e| AuthFailure::MalformedResponse(e.to_string()))?;

        if let Some(err) = envelope.error {
            return Err(AuthFailure::InvalidCredentials(err.describe()));
        }

        let result = envelope
            .result
            .ok_or_else(|| AuthFailure::MalformedResponse("response has no result".into()))?;

        let uid = match result.get("uid").and_then(Value::as_i64) {
            Some(uid) if uid > 0 => uid,
            _ => return Err(AuthFailure::InvalidCredentials("no authenticated uid".into())),
        };

        let token = cookie_token
            .or_else(|| {
                result
                    .get("session_id")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .ok_or_else(|| AuthFailure::MalformedResponse("no session credential returned".into()))?;

        Ok(SessionHandle::new(token, uid))
    }
}

#[async_trait]
impl RemoteApi for OdooRpcClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionHandle, AuthFailure> {
        self.login(credentials).await
    }

    async fn search(&self, session: &SessionHandle, model: &str, domain: &Domain) -> SyncResult<Vec<RemoteId>> {
        let result = self
            .call_kw(session, model, "search", json!([domain]), json!({}))
            .await?;
        parse_ids(model, "search", result)
    }

    async fn search_read(
        &self,
        session: &SessionHandle,
        model: &str,
        domain: &Domain,
        fields: &[String],
    ) -> SyncResult<Vec<FieldValues>> {
        let result = self
            .call_kw(
                session,
                model,
                "search_read",
                json!([domain]),
                json!({ "fields": fields, "order": "id asc" }),
            )
            .await?;

        match result {
            Value::Array(rows) => rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(map) => Ok(map),
                    other => Err(SyncError::MalformedResponse(format!(
                        "{}.search_read: expected object row, got {}",
                        model, other
                    ))),
                })
                .collect(),
            other => Err(SyncError::MalformedResponse(format!(
                "{}.search_read: expected array, got {}",
                model, other
            ))),
        }
    }

    async fn create(&self, session: &SessionHandle, model: &str, values: FieldValues) -> SyncResult<RemoteId> {
        let result = self
            .call_kw(session, model, "create", json!([values]), json!({}))
            .await?;

        // Newer servers answer a single create with a one-element list.
        let id = match &result {
            Value::Array(ids) if ids.len() == 1 => ids[0].as_i64(),
            other => other.as_i64(),
        };

        match id {
            Some(id) if id > 0 => Ok(RemoteId::new(id)),
            _ => Err(SyncError::MalformedResponse(format!(
                "{}.create: expected record id, got {}",
                model, result
            ))),
        }
    }

    async fn write(
        &self,
        session: &SessionHandle,
        model: &str,
        ids: &[RemoteId],
        values: FieldValues,
    ) -> SyncResult<()> {
        let result = self
            .call_kw(session, model, "write", json!([ids, values]), json!({}))
            .await?;
        expect_true(model, "write", result)
    }

    async fn unlink(&self, session: &SessionHandle, model: &str, ids: &[RemoteId]) -> SyncResult<()> {
        let result = self
            .call_kw(session, model, "unlink", json!([ids]), json!({}))
            .await?;
        expect_true(model, "unlink", result)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn parse_ids(model: &str, method: &str, result: Value) -> SyncResult<Vec<RemoteId>> {
    let malformed = || SyncError::MalformedResponse(format!("{}.{}: expected list of ids", model, method));

    result
        .as_array()
        .ok_or_else(malformed)?
        .iter()
        .map(|v| v.as_i64().map(RemoteId::new).ok_or_else(malformed))
        .collect()
}

fn expect_true(model: &str, method: &str, result: Value) -> SyncResult<()> {
    if result == Value::Bool(true) {
        Ok(())
    } else {
        Err(SyncError::WriteRejected {
            model: model.to_string(),
            method: method.to_string(),
        })
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
