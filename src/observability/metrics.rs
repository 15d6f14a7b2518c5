//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): dispatched requests by page, outcome, status
//! - `dispatch_duration_seconds` (histogram): time from dispatch to terminal state
//! - `chain_rejections_total` (counter): pages that rejected a request
//! - `closables_sweeps_total` (counter): registry sweeps by trigger
//! - `closables_entries_closed_total` (counter): entries closed by sweeps
//! - `closables_close_failures_total` (counter): entries whose close failed
//! - `internal_errors_total` (counter): errors reported to the sink, by kind
//! - `active_connections` (gauge): connections currently open
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade, a no-op until a recorder
//!   is installed
//! - Prometheus exposition is opt-in via `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(page: &str, outcome: &'static str, status: u16, start: Instant) {
    counter!(
        "dispatch_requests_total",
        "page" => page.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("dispatch_duration_seconds", "page" => page.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(page: &str) {
    counter!("chain_rejections_total", "page" => page.to_string()).increment(1);
}

pub fn record_sweep(trigger: &'static str, closed: usize, failures: usize) {
    counter!("closables_sweeps_total", "trigger" => trigger).increment(1);
    counter!("closables_entries_closed_total").increment(closed as u64);
    if failures > 0 {
        counter!("closables_close_failures_total").increment(failures as u64);
    }
}

pub fn record_internal_error(kind: &'static str) {
    counter!("internal_errors_total", "kind" => kind).increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("active_connections").set(count as f64);
}
