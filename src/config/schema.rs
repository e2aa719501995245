//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the control
//! plane. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::LoadBalancingAlgorithm;
use crate::redundancy::RedundancyMode;

/// Root configuration for the control plane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContinuityConfig {
    /// Dependency health probing.
    pub health: HealthMonitorConfig,

    /// Primary/secondary connection pools.
    pub redundancy: RedundancyConfig,

    /// Node groups, load balancing and promotion.
    pub availability: AvailabilityConfig,

    /// Cross-region heartbeats, replication and cutover.
    pub regions: RegionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthMonitorConfig {
    /// Run the periodic probe cycle.
    pub enabled: bool,

    /// Seconds between probe cycles.
    pub interval_secs: u64,

    /// Per-probe deadline in milliseconds.
    pub probe_timeout_ms: u64,

    /// Consecutive failures before a dependency is Unhealthy.
    pub unhealthy_threshold: u32,

    /// Consecutive failures before a dependency is Offline.
    pub offline_threshold: u32,

    /// Successful probes slower than this are reported Degraded.
    pub latency_threshold_ms: u64,

    /// Fine-grained snapshots folded into one hourly entry.
    pub fold_every: usize,

    /// Number of hourly entries retained.
    pub hourly_capacity: usize,

    /// Dependencies registered at startup.
    pub dependencies: Vec<DependencyConfig>,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            probe_timeout_ms: 5000,
            unhealthy_threshold: 3,
            offline_threshold: 10,
            latency_threshold_ms: 1000,
            fold_every: 60,
            hourly_capacity: 24,
            dependencies: Vec::new(),
        }
    }
}

impl HealthMonitorConfig {
    /// Snapshots needed to cover one hour at the configured interval.
    pub fn fine_capacity(&self) -> usize {
        (3600 / self.interval_secs.max(1)).max(1) as usize
    }
}

/// A monitored dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    /// Display name, unique across the monitor.
    pub name: String,

    /// Probe target (e.g. "db.internal:5432").
    pub target: String,
}

/// Redundancy manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedundancyConfig {
    /// Run the heartbeat and sync loops.
    pub enabled: bool,

    /// Seconds between heartbeats.
    pub heartbeat_interval_secs: u64,

    /// Run replication passes; off when no replication feed is available.
    pub sync_enabled: bool,

    /// Seconds between replication passes.
    pub sync_interval_secs: u64,

    /// Per-probe deadline in milliseconds.
    pub probe_timeout_ms: u64,

    /// Reconnect attempts before an instance is marked Failed.
    pub max_reconnect_attempts: u32,

    /// Base delay for exponential reconnect backoff in milliseconds.
    pub reconnect_base_delay_ms: u64,

    /// Maximum delay for exponential reconnect backoff in milliseconds.
    pub reconnect_max_delay_ms: u64,

    /// Switch to the secondary automatically when the primary is unhealthy.
    pub auto_failover: bool,

    /// Switch back automatically once the primary recovers.
    pub auto_failback: bool,

    /// Sync events retained per pool.
    pub sync_history_capacity: usize,

    /// Pools created at startup.
    pub pools: Vec<PoolConfig>,
}

impl Default for RedundancyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval_secs: 10,
            sync_enabled: true,
            sync_interval_secs: 60,
            probe_timeout_ms: 3000,
            max_reconnect_attempts: 3,
            reconnect_base_delay_ms: 100,
            reconnect_max_delay_ms: 5000,
            auto_failover: true,
            auto_failback: false,
            sync_history_capacity: 100,
            pools: Vec::new(),
        }
    }
}

/// A connection pool definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Logical dependency name (e.g. "cache").
    pub name: String,

    /// Replication fidelity of the secondary.
    pub mode: RedundancyMode,

    /// Primary endpoint.
    pub primary: String,

    /// Secondary endpoint.
    #[serde(default)]
    pub secondary: Option<String>,

    /// Additional standby endpoints.
    #[serde(default)]
    pub standbys: Vec<String>,
}

/// High-availability manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AvailabilityConfig {
    /// Run the periodic node check loop.
    pub enabled: bool,

    /// Seconds between node checks.
    pub check_interval_secs: u64,

    /// CPU utilization percentage considered unhealthy.
    pub cpu_threshold: f64,

    /// Memory utilization percentage considered unhealthy.
    pub memory_threshold: f64,

    /// Latency in milliseconds considered unhealthy.
    pub latency_threshold_ms: f64,

    /// Fraction of max connections considered saturated.
    pub connection_capacity_ratio: f64,

    /// Consecutive failed checks before automatic failover.
    pub failure_threshold: u32,

    /// Node selection policy.
    pub algorithm: LoadBalancingAlgorithm,

    /// Pause between restart phases in milliseconds.
    pub restart_delay_ms: u64,

    /// Failover events retained.
    pub history_capacity: usize,

    /// Nodes registered at startup.
    pub nodes: Vec<NodeConfig>,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 15,
            cpu_threshold: 80.0,
            memory_threshold: 85.0,
            latency_threshold_ms: 500.0,
            connection_capacity_ratio: 0.9,
            failure_threshold: 3,
            algorithm: LoadBalancingAlgorithm::WeightedRoundRobin,
            restart_delay_ms: 2000,
            history_capacity: 1000,
            nodes: Vec::new(),
        }
    }
}

/// A service node definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Unique node identifier within its service.
    pub id: String,

    /// Service group this node belongs to.
    pub service: String,

    /// Host name or address.
    pub host: String,

    /// Port.
    pub port: u16,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Maximum concurrent connections to this node.
    #[serde(default = "default_max_node_conns")]
    pub max_connections: u32,

    /// Whether this node starts as the service primary.
    #[serde(default)]
    pub primary: bool,
}

fn default_weight() -> u32 {
    1
}

fn default_max_node_conns() -> u32 {
    1000
}

/// Multi-region engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Run the heartbeat and sync loops.
    pub enabled: bool,

    /// Seconds between region heartbeats.
    pub heartbeat_interval_secs: u64,

    /// Consecutive failed heartbeats before a region is acted on.
    pub heartbeat_failure_threshold: u32,

    /// Per-probe deadline in milliseconds.
    pub probe_timeout_ms: u64,

    /// Run replication checks; off when no replication feed is available.
    pub sync_enabled: bool,

    /// Seconds between replication checks.
    pub sync_check_interval_secs: u64,

    /// Replication lag in milliseconds still considered in sync.
    pub max_sync_lag_ms: u64,

    /// Pending records still considered in sync.
    pub max_pending_records: u64,

    /// Recovery-time objective in seconds.
    pub rto_secs: u64,

    /// Recovery-point objective in seconds.
    pub rpo_secs: u64,

    /// Base pause per cutover step in milliseconds.
    pub cutover_step_ms: u64,

    /// Maximum age of the primary's heartbeat counted as fresh.
    pub heartbeat_freshness_secs: u64,

    /// Readiness score at or above which a failover is considered safe.
    pub readiness_threshold: f64,

    /// Heartbeats, sync reports and timeline entries retained, each.
    pub history_capacity: usize,

    /// Regions registered at startup.
    pub regions: Vec<RegionDefinition>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval_secs: 30,
            heartbeat_failure_threshold: 3,
            probe_timeout_ms: 5000,
            sync_enabled: true,
            sync_check_interval_secs: 60,
            max_sync_lag_ms: 5000,
            max_pending_records: 1000,
            rto_secs: 300,
            rpo_secs: 60,
            cutover_step_ms: 500,
            heartbeat_freshness_secs: 60,
            readiness_threshold: 0.7,
            history_capacity: 1000,
            regions: Vec::new(),
        }
    }
}

/// A region definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionDefinition {
    /// Unique region identifier (e.g. "us-east-1").
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,

    /// Endpoint probed for heartbeats.
    pub endpoint: String,

    /// Availability zones in this region.
    #[serde(default)]
    pub availability_zones: Vec<String>,

    /// Whether this region starts as primary.
    #[serde(default)]
    pub primary: bool,

    /// Capacity in abstract load units.
    #[serde(default = "default_region_capacity")]
    pub capacity: f64,
}

fn default_region_capacity() -> f64 {
    100.0
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContinuityConfig::default();
        assert_eq!(config.health.unhealthy_threshold, 3);
        assert_eq!(config.health.fine_capacity(), 120);
        assert_eq!(config.regions.heartbeat_failure_threshold, 3);
        assert_eq!(
            config.availability.algorithm,
            LoadBalancingAlgorithm::WeightedRoundRobin
        );
    }

    #[test]
    fn test_minimal_toml() {
        let raw = r#"
            [health]
            interval_secs = 10

            [[redundancy.pools]]
            name = "cache"
            mode = "hot_standby"
            primary = "cache-a:6379"
            secondary = "cache-b:6379"

            [[availability.nodes]]
            id = "api-1"
            service = "api"
            host = "10.0.0.1"
            port = 8080
            weight = 70
            primary = true
        "#;
        let config: ContinuityConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.health.interval_secs, 10);
        assert_eq!(config.health.probe_timeout_ms, 5000);
        assert_eq!(config.redundancy.pools[0].mode, RedundancyMode::HotStandby);
        assert_eq!(config.availability.nodes[0].weight, 70);
        assert_eq!(config.availability.nodes[0].max_connections, 1000);
    }
}
