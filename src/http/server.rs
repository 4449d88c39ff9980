//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the gateway Router (catch-all API traffic)
//! - Create the snapshot store Router (`/current`, `/release`)
//! - Wire up middleware (tracing, timeouts, body limits, request ID)
//! - Serve both listeners until shutdown

use axum::{
    body::{to_bytes, Body},
    extract::{Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::context::{ContextResolver, ResolveOptions};
use crate::http::pipeline::{ContextEcho, PolicyPipeline};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::{apply_allow_origin, error_response, preflight_response};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::retry_with_backoff;
use crate::routing::{find_candidates, select_candidate, GatewayRequest, MatchError};
use crate::security::RateLimiterCache;
use crate::store::{SnapshotId, SnapshotManager, StoreError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SnapshotManager>,
    pub resolver: Arc<ContextResolver>,
    pub limiter: Arc<RateLimiterCache>,
    pub pipeline: Arc<dyn PolicyPipeline>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(manager: Arc<SnapshotManager>, config: Arc<GatewayConfig>) -> Self {
        Self {
            resolver: Arc::new(ContextResolver::new(
                config.gateway.test_app_enabled,
                config.gateway.scheme.clone(),
            )),
            limiter: Arc::new(RateLimiterCache::new()),
            pipeline: Arc::new(ContextEcho),
            manager,
            config,
        }
    }

    /// Replace the default [`ContextEcho`] pipeline.
    pub fn with_pipeline(mut self, pipeline: Arc<dyn PolicyPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// HTTP server for the gateway and its snapshot store endpoints.
pub struct GatewayServer {
    state: AppState,
}

impl GatewayServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Router for API traffic.
    #[allow(deprecated)]
    pub fn gateway_router(&self) -> Router {
        let config = &self.state.config;
        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(self.state.clone())
            .layer(RequestBodyLimitLayer::new(config.gateway.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Router for the snapshot refcount endpoints.
    pub fn store_router(&self) -> Router {
        Router::new()
            .route("/current", get(current_handler))
            .route("/release", get(release_handler))
            .with_state(self.state.manager.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve both routers until `shutdown` fires.
    pub async fn run(
        self,
        gateway_listener: TcpListener,
        store_listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            gateway_address = %gateway_listener.local_addr()?,
            store_address = %store_listener.local_addr()?,
            "HTTP server starting"
        );

        let gateway = {
            let shutdown = shutdown.clone();
            axum::serve(gateway_listener, self.gateway_router())
                .with_graceful_shutdown(async move { shutdown.signalled().await })
        };
        let store = {
            let shutdown = shutdown.clone();
            axum::serve(store_listener, self.store_router())
                .with_graceful_shutdown(async move { shutdown.signalled().await })
        };

        let result = tokio::try_join!(gateway.into_future(), store.into_future());
        tracing::info!("HTTP server stopped");
        result.map(|_| ())
    }
}

/// Match, rate-limit, resolve, then hand the context to the pipeline.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().as_str().to_string();

    let response = handle_gateway_request(&state, request, &request_id).await;
    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

async fn handle_gateway_request(state: &AppState, request: Request<Body>, request_id: &str) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, state.config.gateway.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }
    };
    let request = GatewayRequest::new(&parts.method, &parts.uri, parts.headers, body);

    let manager = &state.manager;
    let lease = match retry_with_backoff(
        &state.config.snapshot_retry,
        || manager.acquire_current_lease(),
        |e| matches!(e, StoreError::NotFound),
    )
    .await
    {
        Ok(lease) => lease,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "No configuration snapshot available");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "no configuration available");
        }
    };

    let client_id = request.client_id();
    let entries = manager.store().visible_entries(lease.id(), client_id.as_deref());
    let candidates = match find_candidates(&request.method, &request.path, &entries) {
        Ok(candidates) => candidates,
        Err(e @ MatchError::NoMatch) => {
            tracing::info!(
                request_id = %request_id,
                snapshot_id = %lease.id(),
                method = %request.method,
                path = %request.path,
                "No route entry matched"
            );
            metrics::record_no_match();
            return error_response(e.status_code(), e.to_string());
        }
    };
    tracing::debug!(request_id = %request_id, candidates = candidates.len(), "Route candidates found");

    let client_secret = request.client_secret();
    let Some(candidate) = select_candidate(candidates, client_secret.as_deref()) else {
        return error_response(StatusCode::NOT_FOUND, MatchError::NoMatch.to_string());
    };
    let entry = Arc::clone(&candidate.entry);

    if candidate.matched_method.is_none() {
        return preflight_response(&candidate.allow_methods, &request.headers);
    }

    if state.config.rate_limit.enabled {
        if let Err(e) = state.limiter.check(&entry.plan_id, &entry.client_id, &entry.rate_limits) {
            return error_response(StatusCode::TOO_MANY_REQUESTS, e.to_string());
        }
    }

    let Some(api) = manager.store().api(lease.id(), &entry.api_id) else {
        tracing::error!(request_id = %request_id, api_id = %entry.api_id, "Route entry references a missing API");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
    };

    let context = match state
        .resolver
        .resolve(&candidate, &request, api, &ResolveOptions::default())
        .await
    {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Context resolution failed");
            return error_response(e.status_code(), e.to_string());
        }
    };

    tracing::debug!(
        request_id = %request_id,
        subscription_id = %entry.subscription_id,
        api = %entry.api_name,
        operation_id = ?candidate.matched_method.as_ref().and_then(|m| m.operation_id.as_deref()),
        "Dispatching to policy pipeline"
    );
    let mut response = state.pipeline.execute(context).await;
    if entry.cors_enabled && request.headers.contains_key(axum::http::header::ORIGIN) {
        apply_allow_origin(&mut response, &request.headers);
    }
    drop(lease);
    response
}

/// `GET /current`: acquire the current snapshot.
async fn current_handler(State(manager): State<Arc<SnapshotManager>>) -> Response {
    match manager.acquire_current() {
        Ok(snapshot) => Json(json!({ "snapshot": snapshot })).into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseQuery {
    id: String,
}

/// `GET /release?id=<id>`: release one reference; `{}` once deleted.
async fn release_handler(
    State(manager): State<Arc<SnapshotManager>>,
    Query(query): Query<ReleaseQuery>,
) -> Response {
    let id: SnapshotId = match query.id.parse() {
        Ok(id) => id,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    match manager.release(id) {
        Some(snapshot) => Json(json!({ "snapshot": snapshot })).into_response(),
        None => Json(json!({ "snapshot": {} })).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Snapshot, SnapshotStore};
    use tower::ServiceExt;

    fn state() -> AppState {
        let manager = Arc::new(SnapshotManager::new(Arc::new(SnapshotStore::new("unused"))));
        let mut config = GatewayConfig::default();
        config.snapshot_retry.max_attempts = 1;
        AppState::new(manager, Arc::new(config))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_gateway_without_snapshot_is_unavailable() {
        let server = GatewayServer::new(state());
        let response = server.gateway_router().oneshot(get("/v1/anything")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["httpCode"], "503");
    }

    #[tokio::test]
    async fn test_current_then_release_to_deletion() {
        let state = state();
        let id = SnapshotId::new(5);
        state.manager.register(Snapshot {
            id,
            refcount: 1,
            current: true,
        });
        let router = GatewayServer::new(state.clone()).store_router();

        let response = router.clone().oneshot(get("/current")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["snapshot"]["refcount"], 2);

        for expected in [serde_json::json!(1), serde_json::Value::Null] {
            let response = router.clone().oneshot(get("/release?id=00005")).await.unwrap();
            let body = body_json(response).await;
            assert_eq!(body["snapshot"]["refcount"], expected);
        }
        assert!(!state.manager.contains(id));

        let response = router.oneshot(get("/release?id=00005")).await.unwrap();
        assert_eq!(body_json(response).await["snapshot"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_current_without_snapshot_is_not_found() {
        let router = GatewayServer::new(state()).store_router();
        let response = router.oneshot(get("/current")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
