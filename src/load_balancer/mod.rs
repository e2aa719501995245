//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! HighAvailabilityManager::get_healthy_node(service)
//!     → Collect serving candidates (Healthy, else Degraded)
//!     → Apply the service group's algorithm:
//!         - round_robin.rs (rotate through candidates)
//!         - weighted.rs (random draw proportional to weight)
//!         - least_conn.rs (fewest current connections)
//!     → Index into the candidate slice
//! ```
//!
//! # Design Decisions
//! - Balancers never see unhealthy nodes; filtering is the caller's job
//! - One balancer instance per service group so rotation state is per group

pub mod least_conn;
pub mod round_robin;
pub mod weighted;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::availability::ServiceNode;

pub use least_conn::LeastConnections;
pub use round_robin::RoundRobin;
pub use weighted::WeightedRoundRobin;

/// Selection policy for a service group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingAlgorithm {
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
}

impl fmt::Display for LoadBalancingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadBalancingAlgorithm::RoundRobin => "round_robin",
            LoadBalancingAlgorithm::WeightedRoundRobin => "weighted_round_robin",
            LoadBalancingAlgorithm::LeastConnections => "least_connections",
        })
    }
}

/// Picks one node out of an already-filtered candidate set.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Index of the chosen candidate, `None` when there are none.
    fn select(&self, candidates: &[&ServiceNode]) -> Option<usize>;
}

pub fn build(algorithm: LoadBalancingAlgorithm) -> Box<dyn LoadBalancer> {
    match algorithm {
        LoadBalancingAlgorithm::RoundRobin => Box::new(RoundRobin::new()),
        LoadBalancingAlgorithm::WeightedRoundRobin => Box::new(WeightedRoundRobin::new()),
        LoadBalancingAlgorithm::LeastConnections => Box::new(LeastConnections::new()),
    }
}
