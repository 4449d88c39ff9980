//! Snapshot load → index → match → context resolution, in process.

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use serde_json::json;

use microgateway::context::{ContextResolver, ParamValue, RequestBody, ResolveError, ResolveOptions};
use microgateway::routing::{find_candidates, select_candidate, GatewayRequest, MatchError};
use microgateway::store::SnapshotId;

mod common;

fn request(method: Method, uri: &str, body: &'static [u8]) -> GatewayRequest {
    let mut headers = HeaderMap::new();
    headers.insert("host", "gw.example.com".parse().unwrap());
    if !body.is_empty() {
        headers.insert("content-type", "application/json".parse().unwrap());
    }
    GatewayRequest::new(&method, &uri.parse().unwrap(), headers, Bytes::from_static(body))
}

async fn loaded() -> (tempfile::TempDir, common::Harness, SnapshotId) {
    let root = tempfile::tempdir().unwrap();
    let id = SnapshotId::new(7);
    let dir = common::write_snapshot(root.path(), id, "100/1hour");
    let harness = common::Harness::new(root.path());
    harness.loader.load_dir(&dir).await.unwrap();
    (root, harness, id)
}

#[tokio::test]
async fn test_literal_path_matches_with_score_zero() {
    let (_root, harness, id) = loaded().await;
    let req = request(Method::GET, "/v1/ascents?client_id=key-a", b"");

    let entries = harness.store.visible_entries(id, req.client_id().as_deref());
    assert_eq!(entries.len(), 1);

    let candidates = find_candidates(&req.method, &req.path, &entries).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].score, 0);
    assert_eq!(
        candidates[0].matched_method.as_ref().unwrap().operation_id.as_deref(),
        Some("listAscents")
    );
}

#[tokio::test]
async fn test_unknown_client_yields_no_match() {
    let (_root, harness, id) = loaded().await;
    let req = request(Method::GET, "/v1/ascents?client_id=stranger", b"");

    let entries = harness.store.visible_entries(id, req.client_id().as_deref());
    assert!(entries.iter().all(|e| e.client_id != "stranger"));
    let err = find_candidates(&req.method, &req.path, &entries).unwrap_err();
    assert_eq!(err, MatchError::NoMatch);
    assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_every_operation_round_trips() {
    let (_root, harness, id) = loaded().await;
    let cases = [
        (Method::GET, "/v1/ascents", "listAscents"),
        (Method::POST, "/v1/ascents", "logAscent"),
        (Method::GET, "/v1/ascents/12", "getAscent"),
        (Method::GET, "/v1/crags/smith/topo/east/wall.png", "getTopo"),
    ];
    let entries = harness.store.visible_entries(id, Some(common::CLIENT_ID));

    for (method, path, operation_id) in cases {
        let req = request(method, path, b"");
        let candidates = find_candidates(&req.method, &req.path, &entries).unwrap();
        let chosen = select_candidate(candidates, None).unwrap();
        assert_eq!(
            chosen.matched_method.as_ref().unwrap().operation_id.as_deref(),
            Some(operation_id),
            "{path}"
        );
    }
}

#[tokio::test]
async fn test_anonymous_callers_see_only_unsecured_defaults() {
    let (_root, harness, id) = loaded().await;
    let entries = harness.store.visible_entries(id, None);
    assert!(!entries.is_empty());

    let post = request(Method::POST, "/v1/ascents", b"");
    assert!(find_candidates(&post.method, &post.path, &entries).is_ok());

    let get = request(Method::GET, "/v1/ascents", b"");
    assert!(find_candidates(&get.method, &get.path, &entries).is_err());
}

#[tokio::test]
async fn test_context_for_path_and_query_parameters() {
    let (_root, harness, id) = loaded().await;
    let resolver = ContextResolver::new(false, "https");
    let entries = harness.store.visible_entries(id, Some(common::CLIENT_ID));

    let req = request(Method::GET, "/v1/crags/smith/topo/east/wall.png?client_id=key-a", b"");
    let candidate = select_candidate(find_candidates(&req.method, &req.path, &entries).unwrap(), None).unwrap();
    let api = harness.store.api(id, &candidate.entry.api_id).unwrap();
    let ctx = resolver.resolve(&candidate, &req, api, &ResolveOptions::default()).await.unwrap();

    assert_eq!(ctx.parameters["crag"], ParamValue::String("smith".into()));
    assert_eq!(
        ctx.parameters["rest"],
        ParamValue::Array(vec![ParamValue::String("east".into()), ParamValue::String("wall.png".into())])
    );
    assert_eq!(ctx.snapshot_id, id);
    assert_eq!(ctx.plan().name, "gold");
    assert_eq!(ctx.plan().rate_limits[0].value, "100/1hour");
    assert_eq!(ctx.client().app.id, common::CLIENT_ID);
    assert_eq!(ctx.env().path, "sandbox");
    assert_eq!(ctx.get_variable("target-url"), Some(json!("https://climbing.backend")));
    assert!(ctx.assembly().is_some());

    let req = request(Method::GET, "/v1/ascents?limit=5&grades=5.10,5.11", b"");
    let candidate = select_candidate(find_candidates(&req.method, &req.path, &entries).unwrap(), None).unwrap();
    let api = harness.store.api(id, &candidate.entry.api_id).unwrap();
    let ctx = resolver.resolve(&candidate, &req, api, &ResolveOptions::default()).await.unwrap();
    assert_eq!(ctx.parameters["limit"], ParamValue::Number(5.0));
    assert_eq!(
        ctx.parameters["grades"],
        ParamValue::Array(vec![ParamValue::String("5.10".into()), ParamValue::String("5.11".into())])
    );
}

#[tokio::test]
async fn test_body_parameter_and_parse_failure() {
    let (_root, harness, id) = loaded().await;
    let resolver = ContextResolver::new(false, "http");
    let entries = harness.store.visible_entries(id, Some(common::CLIENT_ID));

    let req = request(Method::POST, "/v1/ascents", br#"{"route":"Nose","style":"free"}"#);
    let candidate = select_candidate(find_candidates(&req.method, &req.path, &entries).unwrap(), None).unwrap();
    let api = harness.store.api(id, &candidate.entry.api_id).unwrap();
    let ctx = resolver.resolve(&candidate, &req, api.clone(), &ResolveOptions::default()).await.unwrap();
    let expected = json!({"route": "Nose", "style": "free"});
    assert_eq!(ctx.parameters["ascent"], ParamValue::Json(expected.clone()));
    assert_eq!(ctx.message_body, Some(RequestBody::Json(expected)));

    let bad = request(Method::POST, "/v1/ascents", b"route=Nose");
    let err = resolver.resolve(&candidate, &bad, api, &ResolveOptions::default()).await.unwrap_err();
    assert!(matches!(err, ResolveError::BodyParse { .. }));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
}
