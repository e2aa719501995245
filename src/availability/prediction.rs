//! Failure risk scoring for service nodes.
//!
//! ```text
//! risk = 0.3 * cpu/100
//!      + 0.3 * memory/100
//!      + 0.2 * connections/max_connections
//!      + 0.2 * min(consecutive_failures / failure_threshold, 1)
//! ```
//!
//! Nodes scoring above [`RISK_THRESHOLD`] are reported, riskiest first.

use serde::Serialize;

use crate::availability::node::{NodeStatus, ServiceNode};

pub const RISK_THRESHOLD: f64 = 0.5;

const CPU_WEIGHT: f64 = 0.3;
const MEMORY_WEIGHT: f64 = 0.3;
const CONNECTION_WEIGHT: f64 = 0.2;
const FAILURE_WEIGHT: f64 = 0.2;

/// The term contributing most to a node's risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    Cpu,
    Memory,
    Connections,
    Failures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailurePrediction {
    pub service: String,
    pub node_id: String,
    pub risk_score: f64,
    pub dominant_factor: RiskFactor,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub connection_ratio: f64,
    pub consecutive_failures: u32,
    pub recommendation: String,
}

/// Weighted risk terms, each clamped before weighting.
#[derive(Debug, Clone, Copy)]
struct RiskTerms {
    cpu: f64,
    memory: f64,
    connections: f64,
    failures: f64,
}

impl RiskTerms {
    fn of(node: &ServiceNode, failure_threshold: u32) -> Self {
        let failures = node.consecutive_failures as f64 / failure_threshold.max(1) as f64;
        Self {
            cpu: CPU_WEIGHT * (node.cpu_usage / 100.0).clamp(0.0, 1.0),
            memory: MEMORY_WEIGHT * (node.memory_usage / 100.0).clamp(0.0, 1.0),
            connections: CONNECTION_WEIGHT * node.connection_ratio().clamp(0.0, 1.0),
            failures: FAILURE_WEIGHT * failures.clamp(0.0, 1.0),
        }
    }

    fn total(&self) -> f64 {
        self.cpu + self.memory + self.connections + self.failures
    }

    /// Largest term; earlier factors win ties.
    fn dominant(&self) -> RiskFactor {
        let mut best = (RiskFactor::Cpu, self.cpu);
        for candidate in [
            (RiskFactor::Memory, self.memory),
            (RiskFactor::Connections, self.connections),
            (RiskFactor::Failures, self.failures),
        ] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }
}

/// Score one node. Each term is clamped to [0, 1], so the score is too.
pub fn risk_score(node: &ServiceNode, failure_threshold: u32) -> f64 {
    RiskTerms::of(node, failure_threshold).total()
}

fn recommendation(node: &ServiceNode, factor: RiskFactor) -> String {
    match factor {
        RiskFactor::Cpu => format!(
            "CPU at {:.0}%: scale out {} or shift load off {}",
            node.cpu_usage, node.service_name, node.id
        ),
        RiskFactor::Memory => format!(
            "Memory at {:.0}%: check {} for leaks or schedule a restart",
            node.memory_usage, node.id
        ),
        RiskFactor::Connections => format!(
            "{} of {} connections in use: raise capacity or add nodes to {}",
            node.current_connections, node.max_connections, node.service_name
        ),
        RiskFactor::Failures => format!(
            "{} consecutive failed checks: prepare failover away from {}",
            node.consecutive_failures, node.id
        ),
    }
}

/// Nodes at risk, riskiest first. Offline and maintenance nodes are excluded.
pub fn predict<'a>(
    nodes: impl IntoIterator<Item = &'a ServiceNode>,
    failure_threshold: u32,
) -> Vec<FailurePrediction> {
    let mut predictions: Vec<FailurePrediction> = nodes
        .into_iter()
        .filter(|n| !matches!(n.status, NodeStatus::Offline | NodeStatus::Maintenance))
        .filter_map(|node| {
            let terms = RiskTerms::of(node, failure_threshold);
            let risk = terms.total();
            let factor = terms.dominant();
            (risk > RISK_THRESHOLD).then(|| FailurePrediction {
                service: node.service_name.clone(),
                node_id: node.id.clone(),
                risk_score: risk,
                dominant_factor: factor,
                cpu_usage: node.cpu_usage,
                memory_usage: node.memory_usage,
                connection_ratio: node.connection_ratio(),
                consecutive_failures: node.consecutive_failures,
                recommendation: recommendation(node, factor),
            })
        })
        .collect();

    predictions.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    predictions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, cpu: f64, memory: f64, failures: u32) -> ServiceNode {
        let mut node = ServiceNode::new(id, "api", "10.0.0.1", 80).with_max_connections(100);
        node.cpu_usage = cpu;
        node.memory_usage = memory;
        node.consecutive_failures = failures;
        node
    }

    #[test]
    fn test_risk_score_weights() {
        let mut n = node("a", 100.0, 100.0, 3);
        n.current_connections = 100;
        assert!((risk_score(&n, 3) - 1.0).abs() < 1e-9);

        let idle = node("b", 0.0, 0.0, 0);
        assert_eq!(risk_score(&idle, 3), 0.0);

        let half = node("c", 50.0, 50.0, 0);
        assert!((risk_score(&half, 3) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_predict_sorts_and_filters() {
        let hot = node("hot", 95.0, 90.0, 3);
        let warm = node("warm", 90.0, 80.0, 0);
        let cool = node("cool", 20.0, 30.0, 0);
        let predictions = predict([&warm, &cool, &hot], 3);

        let ids: Vec<&str> = predictions.iter().map(|p| p.node_id.as_str()).collect();
        assert_eq!(ids, vec!["hot", "warm"]);
        assert!(predictions[0].risk_score > predictions[1].risk_score);
        assert!(predictions[1].recommendation.contains("CPU"));
        assert_eq!(predictions[1].dominant_factor, RiskFactor::Cpu);
    }

    #[test]
    fn test_recommendation_follows_clamped_terms() {
        // 300 of 100 connections would outweigh CPU unclamped; clamped it cannot.
        let mut crowded = node("crowded", 90.0, 85.0, 0);
        crowded.current_connections = 300;
        let predictions = predict([&crowded], 3);

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].dominant_factor, RiskFactor::Cpu);
        assert!(predictions[0].recommendation.starts_with("CPU at 90%"));

        let flaky = node("flaky", 60.0, 60.0, 3);
        let predictions = predict([&flaky], 3);
        assert_eq!(predictions[0].dominant_factor, RiskFactor::Failures);
        assert!(predictions[0].recommendation.contains("3 consecutive failed checks"));
    }

    #[test]
    fn test_offline_nodes_excluded() {
        let mut gone = node("gone", 99.0, 99.0, 5);
        gone.status = NodeStatus::Offline;
        assert!(predict([&gone], 3).is_empty());
    }
}
