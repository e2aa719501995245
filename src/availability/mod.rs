//! Node-level high availability.
//!
//! # Data Flow
//! ```text
//! Host pushes readings → update_metrics (node.rs: NodeMetrics)
//!
//! Check tick (manager.rs):
//!     For each node
//!     → Four threshold checks (cpu, memory, connections, latency)
//!     → Healthy / Degraded / Unhealthy, failure counter
//!     → At the failure threshold: promote a peer, node goes Offline
//!
//! get_healthy_node → load_balancer (per service group)
//! predict_failures → prediction.rs
//! ```

pub mod manager;
pub mod node;
pub mod prediction;

pub use manager::{HighAvailabilityManager, ServiceStatus};
pub use node::{FailoverEvent, HealthCheckResult, NodeMetrics, NodeStatus, ServiceNode};
pub use prediction::{FailurePrediction, RiskFactor};
