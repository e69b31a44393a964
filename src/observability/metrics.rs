//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): intercepted requests by method, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_audit_failures_total` (counter): failed sink writes by stage
//! - `proxy_tunnels_opened_total` (counter): CONNECT tunnels established
//! - `proxy_tunnels_active` (gauge): tunnels currently pumping
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Requires a running tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_request(method: &str, status: u16, start_time: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds")
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_audit_failure(stage: &'static str) {
    metrics::counter!("proxy_audit_failures_total", "stage" => stage).increment(1);
}

pub fn record_tunnel_opened() {
    metrics::counter!("proxy_tunnels_opened_total").increment(1);
    metrics::gauge!("proxy_tunnels_active").increment(1.0);
}

pub fn record_tunnel_closed() {
    metrics::gauge!("proxy_tunnels_active").decrement(1.0);
}
