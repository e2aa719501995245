//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::availability::ServiceNode;
use crate::load_balancer::LoadBalancer;

/// Round-robin selector.
/// Stores an internal counter to rotate through candidates.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn select(&self, candidates: &[&ServiceNode]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(count % candidates.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let n1 = ServiceNode::new("a", "api", "127.0.0.1", 8080);
        let n2 = ServiceNode::new("b", "api", "127.0.0.1", 8081);
        let nodes = vec![&n1, &n2];

        assert_eq!(lb.select(&nodes), Some(0));
        assert_eq!(lb.select(&nodes), Some(1));
        assert_eq!(lb.select(&nodes), Some(0));
    }

    #[test]
    fn test_empty() {
        assert_eq!(RoundRobin::new().select(&[]), None);
    }
}
