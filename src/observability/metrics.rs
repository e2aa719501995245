//! Metrics collection and exposition.
//!
//! # Metrics
//! - `continuity_dependency_status` (gauge): 1=healthy, 0.5=degraded, 0=otherwise
//! - `continuity_probe_latency_ms` (histogram): per-dependency probe latency
//! - `continuity_instance_healthy` (gauge): per pool instance
//! - `continuity_pool_failovers_total` (counter): by pool, manual
//! - `continuity_sync_duration_ms` (histogram), `continuity_sync_passes_total` (counter)
//! - `continuity_node_status` (gauge), `continuity_node_failovers_total` (counter)
//! - `continuity_region_failovers_total` (counter), `continuity_region_failover_duration_ms` (histogram)
//! - `continuity_replication_lag_ms` (gauge), `continuity_failover_readiness` (gauge)
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::availability::NodeStatus;
use crate::health::HealthStatus;

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

fn health_value(status: HealthStatus) -> f64 {
    match status {
        HealthStatus::Healthy => 1.0,
        HealthStatus::Degraded => 0.5,
        _ => 0.0,
    }
}

pub fn record_dependency_status(name: &str, status: HealthStatus) {
    gauge!("continuity_dependency_status", "dependency" => name.to_string())
        .set(health_value(status));
}

pub fn record_probe_latency(name: &str, latency: Duration) {
    histogram!("continuity_probe_latency_ms", "dependency" => name.to_string())
        .record(latency.as_secs_f64() * 1000.0);
}

pub fn record_instance_health(pool: &str, instance: &str, healthy: bool) {
    gauge!(
        "continuity_instance_healthy",
        "pool" => pool.to_string(),
        "instance" => instance.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_pool_failover(pool: &str, manual: bool) {
    counter!(
        "continuity_pool_failovers_total",
        "pool" => pool.to_string(),
        "manual" => manual.to_string()
    )
    .increment(1);
}

pub fn record_sync_pass(pool: &str, duration: Duration, success: bool) {
    counter!(
        "continuity_sync_passes_total",
        "pool" => pool.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
    histogram!("continuity_sync_duration_ms", "pool" => pool.to_string())
        .record(duration.as_secs_f64() * 1000.0);
}

pub fn record_node_status(service: &str, node: &str, status: NodeStatus) {
    let value = match status {
        NodeStatus::Healthy => 1.0,
        NodeStatus::Degraded => 0.5,
        _ => 0.0,
    };
    gauge!(
        "continuity_node_status",
        "service" => service.to_string(),
        "node" => node.to_string()
    )
    .set(value);
}

pub fn record_node_failover(service: &str, success: bool) {
    counter!(
        "continuity_node_failovers_total",
        "service" => service.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

pub fn record_region_failover(duration: Duration, rto_met: bool, manual: bool) {
    counter!(
        "continuity_region_failovers_total",
        "rto_met" => rto_met.to_string(),
        "manual" => manual.to_string()
    )
    .increment(1);
    histogram!("continuity_region_failover_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

pub fn record_replication_lag(from: &str, to: &str, lag_ms: u64) {
    gauge!(
        "continuity_replication_lag_ms",
        "source" => from.to_string(),
        "target" => to.to_string()
    )
    .set(lag_ms as f64);
}

pub fn record_readiness(score: f64) {
    gauge!("continuity_failover_readiness").set(score);
}
