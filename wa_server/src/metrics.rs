//! Prometheus metrics for the tournament automation daemon.
//!
//! Metrics are exposed in Prometheus text format on the `METRICS_BIND`
//! address for scraping.

#![allow(dead_code)] // Public API for future integration

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize the Prometheus metrics exporter.
///
/// Metrics become available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Lifecycle Engine Metrics
// ============================================================================

/// Record one poll pass duration in milliseconds.
pub fn poll_duration_ms(duration_ms: f64) {
    metrics::histogram!("engine_poll_duration_ms").record(duration_ms);
}

/// Set the number of instances evaluated by the latest pass.
pub fn instances_checked(count: usize) {
    metrics::gauge!("engine_instances_checked").set(count as f64);
}

/// Increment fired transitions.
pub fn transitions_fired_total(count: usize) {
    metrics::counter!("engine_transitions_fired_total").increment(count as u64);
}

/// Increment skipped transitions (guard held or budget exhausted).
pub fn transitions_skipped_total(count: usize) {
    metrics::counter!("engine_transitions_skipped_total").increment(count as u64);
}

/// Increment per-instance transition failures.
pub fn transition_failures_total(count: usize) {
    metrics::counter!("engine_transition_failures_total").increment(count as u64);
}

/// Increment whole-pass failures (record store unreachable).
pub fn poll_failures_total() {
    metrics::counter!("engine_poll_failures_total").increment(1);
}

/// Set snapshot-call budget occupancy.
pub fn budget_calls_used(hourly: u32, daily: u32) {
    metrics::gauge!("engine_budget_hourly_used").set(hourly as f64);
    metrics::gauge!("engine_budget_daily_used").set(daily as f64);
}

// ============================================================================
// Deployment Scheduler Metrics
// ============================================================================

/// Increment created tournament instances.
pub fn deployments_created_total(count: usize) {
    metrics::counter!("scheduler_deployments_created_total").increment(count as u64);
}

/// Increment failed deployment attempts.
pub fn deployment_failures_total(count: usize) {
    metrics::counter!("scheduler_deployment_failures_total").increment(count as u64);
}

/// Increment failed deployment sweeps.
pub fn sweep_failures_total() {
    metrics::counter!("scheduler_sweep_failures_total").increment(1);
}
