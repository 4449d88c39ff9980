//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_no_match_total` (counter): requests with no matching route entry
//! - `gateway_index_builds_total` (counter): index builds by trigger, outcome
//! - `gateway_route_entries_written_total` (counter)
//! - `gateway_snapshots_deleted_total` (counter): cascade deletes by outcome
//! - `gateway_rate_limited_total` (counter): rejected requests by limit name
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - The Prometheus exporter owns its own listener

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and start its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_no_match() {
    counter!("gateway_no_match_total").increment(1);
}

pub fn record_index_build(trigger: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("gateway_index_builds_total", "trigger" => trigger, "outcome" => outcome).increment(1);
}

pub fn record_route_entries_written(count: usize) {
    counter!("gateway_route_entries_written_total").increment(count as u64);
}

pub fn record_snapshot_deleted(ok: bool) {
    let outcome = if ok { "ok" } else { "partial" };
    counter!("gateway_snapshots_deleted_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(limit: &str) {
    counter!("gateway_rate_limited_total", "limit" => limit.to_string()).increment(1);
}
