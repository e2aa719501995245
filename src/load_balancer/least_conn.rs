//! Least Connections load balancing strategy.

use crate::availability::ServiceNode;
use crate::load_balancer::LoadBalancer;

/// Least connections selector.
/// Selects the node with the minimum number of current connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn select(&self, candidates: &[&ServiceNode]) -> Option<usize> {
        // In case of tie, the first one is selected (stability)
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, n)| n.current_connections)
            .map(|(i, _)| i)
    }
}
