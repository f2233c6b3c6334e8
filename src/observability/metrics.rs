//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (requests, latency, failovers, backend state)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-backend and aggregate metrics
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by backend, status
//!   (upstream status code, or `transport_error` when no response came back)
//! - `lb_request_duration_seconds` (histogram): latency by backend
//! - `lb_failovers_total` (counter): retries on an alternate backend
//! - `lb_backend_alive` (gauge): 1=alive, 0=dead
//! - `lb_backend_active_connections` (gauge): in-flight requests
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - Labels for backend and status only

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Status label for attempts that never got an upstream response.
pub const TRANSPORT_ERROR: &str = "transport_error";

/// Record a completed request.
pub fn record_request(backend: &str, status: u16, start: Instant) {
    record(backend, status.to_string(), start);
}

/// Record an attempt that failed before the backend answered.
pub fn record_transport_error(backend: &str, start: Instant) {
    record(backend, TRANSPORT_ERROR.to_string(), start);
}

fn record(backend: &str, status: String, start: Instant) {
    metrics::counter!(
        "lb_requests_total",
        "backend" => backend.to_string(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("lb_request_duration_seconds", "backend" => backend.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a failover onto an alternate backend.
pub fn record_failover() {
    metrics::counter!("lb_failovers_total").increment(1);
}

/// Record a backend's liveness and load after a probe.
pub fn record_backend_health(backend: &str, alive: bool, active_connections: usize) {
    metrics::gauge!("lb_backend_alive", "backend" => backend.to_string())
        .set(if alive { 1.0 } else { 0.0 });
    metrics::gauge!("lb_backend_active_connections", "backend" => backend.to_string())
        .set(active_connections as f64);
}
