//! Metrics collection and exposition.
//!
//! # Metrics
//! - `paywindow_probe_total` (counter): candidate probes by host, result
//! - `paywindow_probe_duration_seconds` (histogram): probe latency by host
//! - `paywindow_probe_cycles_total` (counter): cycle outcomes (updated, failed, restarted)
//! - `paywindow_active_endpoint_switches_total` (counter): endpoint changes
//! - `paywindow_active_endpoint_index` (gauge): candidate index in use (0 = default)
//! - `paywindow_refresh_coalesced_total` (counter): refreshes folded into a running cycle
//! - `paywindow_session_events_total` (counter): checkout lifecycle signals by kind

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one candidate probe.
pub fn record_probe(host: &str, reachable: bool, latency: Duration) {
    let result = if reachable { "reachable" } else { "unreachable" };
    ::metrics::counter!("paywindow_probe_total", "host" => host.to_string(), "result" => result).increment(1);
    ::metrics::histogram!("paywindow_probe_duration_seconds", "host" => host.to_string())
        .record(latency.as_secs_f64());
}

/// Record how a probe cycle ended.
pub fn record_cycle(outcome: &'static str) {
    ::metrics::counter!("paywindow_probe_cycles_total", "outcome" => outcome).increment(1);
}

/// Record a change of the active endpoint.
pub fn record_endpoint_switch(index: usize) {
    ::metrics::counter!("paywindow_active_endpoint_switches_total").increment(1);
    ::metrics::gauge!("paywindow_active_endpoint_index").set(index as f64);
}

/// Record a refresh folded into the cycle already running.
pub fn record_refresh_coalesced() {
    ::metrics::counter!("paywindow_refresh_coalesced_total").increment(1);
}

/// Record a checkout lifecycle signal.
pub fn record_session_event(kind: &'static str) {
    ::metrics::counter!("paywindow_session_events_total", "kind" => kind).increment(1);
}
