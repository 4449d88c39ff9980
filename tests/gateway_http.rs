//! End-to-end tests over real sockets.

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

use microgateway::context::Context;
use microgateway::http::PolicyPipeline;
use microgateway::store::SnapshotId;
use microgateway::{AppState, GatewayConfig, GatewayServer, Shutdown};

mod common;

struct TestGateway {
    gateway: SocketAddr,
    store: SocketAddr,
    shutdown: Shutdown,
    harness: common::Harness,
    _root: tempfile::TempDir,
}

impl TestGateway {
    async fn start(rate_limit: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        common::write_snapshot(root.path(), SnapshotId::new(1), rate_limit);
        let harness = common::Harness::new(root.path());
        harness.loader.load_latest(root.path()).await.unwrap();

        let mut config = GatewayConfig::default();
        config.store.config_root = root.path().to_path_buf();
        config.snapshot_retry.max_attempts = 1;
        let state = AppState::new(Arc::clone(&harness.manager), Arc::new(config));

        let gateway_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let store_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let gateway = gateway_listener.local_addr().unwrap();
        let store = store_listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server = GatewayServer::new(state);
        tokio::spawn(server.run(gateway_listener, store_listener, shutdown.clone()));

        Self {
            gateway,
            store,
            shutdown,
            harness,
            _root: root,
        }
    }

    fn gateway_url(&self, path: &str) -> String {
        format!("http://{}{}", self.gateway, path)
    }

    fn store_url(&self, path: &str) -> String {
        format!("http://{}{}", self.store, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

#[tokio::test]
async fn test_subscribed_client_gets_resolved_context() {
    let gw = TestGateway::start("100/1hour").await;
    let response = reqwest::get(gw.gateway_url("/v1/ascents?client_id=key-a&limit=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["api"]["operation"]["operationId"], "listAscents");
    assert_eq!(body["request"]["parameters"]["limit"], 5.0);
    assert_eq!(body["client"]["app"]["id"], "key-a");
    assert!(body["client"]["app"].get("secret").is_none());
    assert_eq!(body["config-snapshot-id"], "00001");
}

#[tokio::test]
async fn test_unknown_client_is_not_found() {
    let gw = TestGateway::start("100/1hour").await;
    let response = reqwest::get(gw.gateway_url("/v1/ascents?client_id=nobody"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["httpCode"], "404");
    assert_eq!(body["moreInformation"], "unable to process the request");
}

#[tokio::test]
async fn test_client_secret_must_match_credential() {
    let gw = TestGateway::start("100/1hour").await;
    let client = reqwest::Client::new();

    let wrong = client
        .get(gw.gateway_url("/v1/ascents?client_id=key-a"))
        .header("x-ibm-client-secret", "WRONG")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::NOT_FOUND);

    let right = client
        .get(gw.gateway_url("/v1/ascents?client_id=key-a"))
        .header("x-ibm-client-secret", common::CLIENT_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(right.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_preflight_lists_declared_methods() {
    let gw = TestGateway::start("100/1hour").await;
    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, gw.gateway_url("/v1/ascents?client_id=key-a"))
        .header("origin", "https://crag.example")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-methods"], "GET,POST,OPTIONS");
    assert_eq!(response.headers()["access-control-allow-origin"], "https://crag.example");
}

#[tokio::test]
async fn test_plan_rate_limit_rejects_excess_requests() {
    let gw = TestGateway::start("1/1hour").await;
    let url = gw.gateway_url("/v1/ascents/7?client_id=key-a");

    let first = reqwest::get(&url).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = reqwest::get(&url).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_current_and_release_endpoints() {
    let gw = TestGateway::start("100/1hour").await;

    let current: Value = reqwest::get(gw.store_url("/current"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["snapshot"]["id"], "00001");
    assert_eq!(current["snapshot"]["refcount"], 2);
    assert_eq!(current["snapshot"]["current"], true);

    let released: Value = reqwest::get(gw.store_url("/release?id=00001"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(released["snapshot"]["refcount"], 1);

    let bad = reqwest::get(gw.store_url("/release?id=abc")).await.unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    // Unknown ids release to an empty snapshot.
    let gone: Value = reqwest::get(gw.store_url("/release?id=00099"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(gone["snapshot"], serde_json::json!({}));
    assert!(gw.harness.manager.contains(SnapshotId::new(1)));
}

/// Answers with the matched operation id in a header.
struct OperationHeader;

impl PolicyPipeline for OperationHeader {
    fn execute(&self, context: Context) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let operation = context.operation.operation_id.unwrap_or_default();
            (StatusCode::ACCEPTED, [("x-operation-id", operation)]).into_response()
        })
    }
}

#[tokio::test]
async fn test_custom_pipeline_receives_context() {
    let root = tempfile::tempdir().unwrap();
    common::write_snapshot(root.path(), SnapshotId::new(1), "100/1hour");
    let harness = common::Harness::new(root.path());
    harness.loader.load_latest(root.path()).await.unwrap();

    let state = AppState::new(Arc::clone(&harness.manager), Arc::new(GatewayConfig::default()))
        .with_pipeline(Arc::new(OperationHeader));
    let router = GatewayServer::new(state).gateway_router();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/ascents")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"route":"Midnight Lightning"}"#))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()["x-operation-id"], "logAscent");
}
