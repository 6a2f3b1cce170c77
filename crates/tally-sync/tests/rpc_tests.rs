//! JSON-RPC client tests against a mock HTTP server.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tally_core::{RemoteId, SessionHandle};
use tally_sync::{Domain, FieldValues, OdooRpcClient, RemoteApi, RpcTimeouts, SyncError};

const MODEL: &str = "x_client_invoice_total";

fn client(server: &MockServer) -> OdooRpcClient {
    OdooRpcClient::new(Url::parse(&server.uri()).unwrap(), RpcTimeouts::default()).unwrap()
}

fn session() -> SessionHandle {
    SessionHandle::new("abc123", 2)
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": "1", "result": result}))
}

fn values(vendor: &str, amount: f64) -> FieldValues {
    let mut values = FieldValues::new();
    values.insert("x_client_name".into(), json!(vendor));
    values.insert("x_total_amount".into(), json!(amount));
    values
}

#[tokio::test]
async fn test_call_kw_path_cookie_and_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/web/dataset/call_kw/{}/search", MODEL)))
        .and(header("cookie", "session_id=abc123"))
        .and(body_partial_json(json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "model": MODEL,
                "method": "search",
                "args": [[["x_client_name", "=", "Acme"]]],
                "kwargs": {}
            }
        })))
        .respond_with(ok(json!([4, 9])))
        .expect(1)
        .mount(&server)
        .await;

    let ids = client(&server)
        .search(&session(), MODEL, &Domain::eq("x_client_name", "Acme"))
        .await
        .unwrap();

    assert_eq!(ids, vec![RemoteId::new(4), RemoteId::new(9)]);
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/odoo/web/dataset/call_kw/{}/search", MODEL)))
        .respond_with(ok(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let base = Url::parse(&format!("{}/odoo", server.uri())).unwrap();
    let client = OdooRpcClient::new(base, RpcTimeouts::default()).unwrap();
    let ids = client.search(&session(), MODEL, &Domain::all()).await.unwrap();

    assert!(ids.is_empty());
}

#[tokio::test]
async fn test_search_read_sends_fields_and_returns_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/web/dataset/call_kw/{}/search_read", MODEL)))
        .and(body_partial_json(json!({
            "params": {"kwargs": {"fields": ["id", "x_client_name", "x_total_amount"]}}
        })))
        .respond_with(ok(json!([
            {"id": 1, "x_client_name": "Acme", "x_total_amount": 450.0},
            {"id": 2, "x_client_name": "Globex", "x_total_amount": 99.99}
        ])))
        .mount(&server)
        .await;

    let fields = vec!["id".to_string(), "x_client_name".to_string(), "x_total_amount".to_string()];
    let rows = client(&server)
        .search_read(&session(), MODEL, &Domain::all(), &fields)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["x_client_name"], json!("Globex"));
}

#[tokio::test]
async fn test_error_envelope_on_200_is_remote_fault() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "error": {
                "code": 200,
                "message": "Odoo Server Error",
                "data": {"name": "odoo.exceptions.AccessError", "message": "You are not allowed to modify this record"}
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .create(&session(), MODEL, values("Acme", 450.0))
        .await
        .unwrap_err();

    match err {
        SyncError::RemoteFault { code, message } => {
            assert_eq!(code, 200);
            assert_eq!(message, "You are not allowed to modify this record");
        }
        other => panic!("expected RemoteFault, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_envelope_wins_over_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "error": {"code": 100, "message": "Session expired"}
        })))
        .mount(&server)
        .await;

    let err = client(&server).unlink(&session(), MODEL, &[RemoteId::new(1)]).await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteFault { code: 100, .. }));
}

#[tokio::test]
async fn test_non_success_status_is_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = client(&server).search(&session(), MODEL, &Domain::all()).await.unwrap_err();

    match &err {
        SyncError::HttpStatus { status, body } => {
            assert_eq!(*status, 502);
            assert!(body.contains("bad gateway"));
        }
        other => panic!("expected HttpStatus, got {:?}", other),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_missing_result_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": "1"})))
        .mount(&server)
        .await;

    let err = client(&server).search(&session(), MODEL, &Domain::all()).await.unwrap_err();
    assert!(matches!(err, SyncError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unparsable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).search(&session(), MODEL, &Domain::all()).await.unwrap_err();
    assert!(matches!(err, SyncError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_create_accepts_scalar_and_list_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"params": {"args": [{"x_client_name": "Acme"}]}})))
        .respond_with(ok(json!(17)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"params": {"args": [{"x_client_name": "Globex"}]}})))
        .respond_with(ok(json!([18])))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(
        client.create(&session(), MODEL, values("Acme", 450.0)).await.unwrap(),
        RemoteId::new(17)
    );
    assert_eq!(
        client.create(&session(), MODEL, values("Globex", 99.99)).await.unwrap(),
        RemoteId::new(18)
    );
}

#[tokio::test]
async fn test_write_false_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/web/dataset/call_kw/{}/write", MODEL)))
        .and(body_partial_json(json!({"params": {"args": [[3], {"x_total_amount": 500.0}]}})))
        .respond_with(ok(json!(false)))
        .mount(&server)
        .await;

    let err = client(&server)
        .write(&session(), MODEL, &[RemoteId::new(3)], values("Acme", 500.0))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::WriteRejected { ref method, .. } if method == "write"));
}

#[tokio::test]
async fn test_unlink_true_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/web/dataset/call_kw/{}/unlink", MODEL)))
        .and(body_partial_json(json!({"params": {"args": [[1, 2]]}})))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .unlink(&session(), MODEL, &[RemoteId::new(1), RemoteId::new(2)])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok(json!([])).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let timeouts = RpcTimeouts {
        request: Duration::from_millis(200),
        connect: Duration::from_secs(1),
    };
    let client = OdooRpcClient::new(Url::parse(&server.uri()).unwrap(), timeouts).unwrap();

    let err = client.search(&session(), MODEL, &Domain::all()).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(_)), "got {:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_server_is_transport() {
    let server = MockServer::builder().start().await;
    let uri = server.uri();
    drop(server);

    let client = OdooRpcClient::new(Url::parse(&uri).unwrap(), RpcTimeouts::default()).unwrap();
    let err = client.search(&session(), MODEL, &Domain::all()).await.unwrap_err();

    assert!(matches!(err, SyncError::Transport(_) | SyncError::Timeout(_)), "got {:?}", err);
}
