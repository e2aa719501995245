//! Weighted random selection.
//!
//! Draws a uniform integer in `[1, total_weight]` and walks the cumulative
//! weights, so over many draws each node is picked in proportion to its
//! weight. Zero-weight nodes are never picked unless every weight is zero,
//! in which case the first candidate is returned.

use rand::Rng;

use crate::availability::ServiceNode;
use crate::load_balancer::LoadBalancer;

#[derive(Debug, Default)]
pub struct WeightedRoundRobin;

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn select(&self, candidates: &[&ServiceNode]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        let total: u64 = candidates.iter().map(|n| n.weight as u64).sum();
        if total == 0 {
            return Some(0);
        }

        let mut draw = rand::thread_rng().gen_range(1..=total);
        for (i, node) in candidates.iter().enumerate() {
            let weight = node.weight as u64;
            if draw <= weight {
                return Some(i);
            }
            draw -= weight;
        }
        Some(candidates.len() - 1)
    }
}
