//! Service nodes and the records produced when checking them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::schema::NodeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
    Maintenance,
    Starting,
    Stopping,
}

impl NodeStatus {
    /// Eligible to take traffic or a promotion.
    pub fn is_serving(&self) -> bool {
        matches!(self, NodeStatus::Healthy | NodeStatus::Degraded)
    }

    /// Skipped by periodic health checks.
    pub fn is_administrative(&self) -> bool {
        matches!(
            self,
            NodeStatus::Maintenance | NodeStatus::Starting | NodeStatus::Stopping
        )
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeStatus::Healthy => "healthy",
            NodeStatus::Degraded => "degraded",
            NodeStatus::Unhealthy => "unhealthy",
            NodeStatus::Offline => "offline",
            NodeStatus::Maintenance => "maintenance",
            NodeStatus::Starting => "starting",
            NodeStatus::Stopping => "stopping",
        })
    }
}

/// Resource readings pushed by the host for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    /// Percent, 0 to 100.
    pub cpu_usage: f64,
    /// Percent, 0 to 100.
    pub memory_usage: f64,
    pub current_connections: u32,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceNode {
    pub id: String,
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub status: NodeStatus,
    pub is_primary: bool,
    pub weight: u32,
    pub current_connections: u32,
    pub max_connections: u32,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub latency_ms: f64,
    pub consecutive_failures: u32,
    pub last_health_check: Option<u64>,
}

impl ServiceNode {
    pub fn new(
        id: impl Into<String>,
        service_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            service_name: service_name.into(),
            host: host.into(),
            port,
            status: NodeStatus::Healthy,
            is_primary: false,
            weight: 1,
            current_connections: 0,
            max_connections: 1000,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            latency_ms: 0.0,
            consecutive_failures: 0,
            last_health_check: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Share of connection capacity in use, 0 when capacity is zero.
    pub fn connection_ratio(&self) -> f64 {
        if self.max_connections == 0 {
            0.0
        } else {
            self.current_connections as f64 / self.max_connections as f64
        }
    }

    pub fn apply_metrics(&mut self, metrics: NodeMetrics) {
        self.cpu_usage = metrics.cpu_usage;
        self.memory_usage = metrics.memory_usage;
        self.current_connections = metrics.current_connections;
        self.latency_ms = metrics.latency_ms;
    }
}

impl From<&NodeConfig> for ServiceNode {
    fn from(config: &NodeConfig) -> Self {
        let node = ServiceNode::new(&config.id, &config.service, &config.host, config.port)
            .with_weight(config.weight)
            .with_max_connections(config.max_connections);
        if config.primary {
            node.primary()
        } else {
            node
        }
    }
}

/// Outcome of one node health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckResult {
    pub node_id: String,
    pub cpu_ok: bool,
    pub memory_ok: bool,
    pub connections_ok: bool,
    pub latency_ok: bool,
    pub failed_checks: u32,
    pub status: NodeStatus,
    pub consecutive_failures: u32,
    pub timestamp: u64,
    /// Present when this check triggered an automatic failover.
    pub failover: Option<FailoverEvent>,
}

/// Audit record of one promotion attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailoverEvent {
    pub id: Uuid,
    pub service: String,
    pub from_node: String,
    pub to_node: Option<String>,
    pub reason: String,
    pub duration_ms: f64,
    pub success: bool,
    pub timestamp: u64,
}
