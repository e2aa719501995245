//! High-availability manager for multi-node services.
//!
//! # Responsibilities
//! - Keep every service group and its nodes
//! - Evaluate node health from pushed resource readings
//! - Promote a peer when a node keeps failing
//! - Load-balance requests across serving nodes
//!
//! Each service group lives in one registry entry, so every read-modify-write
//! on a group (including moving the primary flag) happens under that entry's
//! lock. No entry is held across an await point.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time;
use uuid::Uuid;

use crate::clock::{as_millis_f64, now_millis};
use crate::config::AvailabilityConfig;
use crate::error::{ContinuityError, ContinuityResult, EntityKind};
use crate::events::{ControlEvent, EventBus};
use crate::load_balancer::{self, LoadBalancer, LoadBalancingAlgorithm};
use crate::observability::metrics;

use super::node::{FailoverEvent, HealthCheckResult, NodeMetrics, NodeStatus, ServiceNode};
use super::prediction::{self, FailurePrediction};

struct ServiceGroup {
    /// Registration order; failover targets are searched in this order.
    nodes: Vec<ServiceNode>,
    balancer: Box<dyn LoadBalancer>,
}

impl ServiceGroup {
    fn position(&self, node_id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == node_id)
    }

    /// First serving node other than `excluded`.
    fn takeover_candidate(&self, excluded: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.id != excluded && n.status.is_serving())
    }

    fn primary(&self) -> Option<&ServiceNode> {
        self.nodes.iter().find(|n| n.is_primary)
    }
}

/// Aggregate view of one service group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub algorithm: LoadBalancingAlgorithm,
    pub total_nodes: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub offline: usize,
    pub maintenance: usize,
    pub primary: Option<String>,
    pub total_connections: u64,
    pub total_capacity: u64,
    pub nodes: Vec<ServiceNode>,
}

/// Status changes to publish once the group entry is released.
type Transition = (String, NodeStatus, NodeStatus);

pub struct HighAvailabilityManager {
    groups: DashMap<String, ServiceGroup>,
    history: Mutex<VecDeque<FailoverEvent>>,
    config: AvailabilityConfig,
    events: EventBus,
}

impl HighAvailabilityManager {
    pub fn new(config: AvailabilityConfig, events: EventBus) -> Self {
        Self {
            groups: DashMap::new(),
            history: Mutex::new(VecDeque::with_capacity(config.history_capacity.min(1024))),
            config,
            events,
        }
    }

    /// Add a node to its service group, creating the group if needed.
    ///
    /// Returns false if a node with the same id is already registered in the
    /// group. A second primary is registered as a non-primary.
    pub fn register_node(&self, mut node: ServiceNode) -> bool {
        let algorithm = self.config.algorithm;
        let mut group = self
            .groups
            .entry(node.service_name.clone())
            .or_insert_with(|| ServiceGroup {
                nodes: Vec::new(),
                balancer: load_balancer::build(algorithm),
            });

        if group.position(&node.id).is_some() {
            return false;
        }
        if node.is_primary {
            if let Some(existing) = group.primary() {
                tracing::warn!(
                    service = %node.service_name,
                    node = %node.id,
                    primary = %existing.id,
                    "Service already has a primary, registering node as secondary"
                );
                node.is_primary = false;
            }
        }

        tracing::info!(
            service = %node.service_name,
            node = %node.id,
            address = %node.address(),
            primary = node.is_primary,
            "Node registered"
        );
        metrics::record_node_status(&node.service_name, &node.id, node.status);
        group.nodes.push(node);
        true
    }

    /// Remove a node. If it was the primary, the first serving peer is promoted.
    pub fn deregister_node(&self, service: &str, node_id: &str) -> ContinuityResult<ServiceNode> {
        let mut group = self
            .groups
            .get_mut(service)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Service, service))?;
        let index = group
            .position(node_id)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Node, node_id))?;

        let removed = group.nodes.remove(index);
        let mut promoted = None;
        if removed.is_primary {
            if let Some(target) = group.takeover_candidate(node_id) {
                group.nodes[target].is_primary = true;
                promoted = Some(group.nodes[target].id.clone());
            }
        }
        let now_empty = group.nodes.is_empty();
        drop(group);

        if now_empty {
            self.groups.remove_if(service, |_, g| g.nodes.is_empty());
        }

        tracing::info!(service = %service, node = %node_id, promoted = ?promoted, "Node deregistered");
        if removed.is_primary {
            let event = FailoverEvent {
                id: Uuid::new_v4(),
                service: service.to_string(),
                from_node: node_id.to_string(),
                to_node: promoted.clone(),
                reason: "primary deregistered".to_string(),
                duration_ms: 0.0,
                success: promoted.is_some(),
                timestamp: now_millis(),
            };
            self.finish_failover(&event);
        }
        Ok(removed)
    }

    pub fn update_metrics(&self, service: &str, node_id: &str, readings: NodeMetrics) -> ContinuityResult<()> {
        self.with_node(service, node_id, |node| node.apply_metrics(readings))
    }

    /// Take a node out of (or back into) rotation.
    pub fn set_maintenance(&self, service: &str, node_id: &str, on: bool) -> ContinuityResult<()> {
        let transition = self.with_node(service, node_id, |node| {
            let from = node.status;
            node.status = if on {
                NodeStatus::Maintenance
            } else {
                node.consecutive_failures = 0;
                NodeStatus::Healthy
            };
            (node.id.clone(), from, node.status)
        })?;
        self.publish_transitions(service, vec![transition]);
        Ok(())
    }

    /// Evaluate one node against the configured thresholds.
    ///
    /// Zero failed sub-checks make the node Healthy and reset its failure
    /// counter; one makes it Degraded; two or more Unhealthy. An Offline
    /// node stays Offline until a fully passing check. Reaching the failure
    /// threshold triggers a failover away from the node.
    pub fn check_health(&self, service: &str, node_id: &str) -> ContinuityResult<HealthCheckResult> {
        let now = now_millis();
        let (mut result, transition, trigger) = self.with_node(service, node_id, |node| {
            let cpu_ok = node.cpu_usage < self.config.cpu_threshold;
            let memory_ok = node.memory_usage < self.config.memory_threshold;
            let connections_ok = node.connection_ratio() < self.config.connection_capacity_ratio;
            let latency_ok = node.latency_ms < self.config.latency_threshold_ms;
            let failed_checks = [cpu_ok, memory_ok, connections_ok, latency_ok]
                .iter()
                .filter(|ok| !**ok)
                .count() as u32;

            let from = node.status;
            let mut trigger = false;
            if !from.is_administrative() {
                node.last_health_check = Some(now);
                if failed_checks == 0 {
                    node.status = NodeStatus::Healthy;
                    node.consecutive_failures = 0;
                } else {
                    node.consecutive_failures = node.consecutive_failures.saturating_add(1);
                    if from != NodeStatus::Offline {
                        node.status = if failed_checks == 1 {
                            NodeStatus::Degraded
                        } else {
                            NodeStatus::Unhealthy
                        };
                        // Fires once per failure streak; a failed attempt is not retried
                        // until the node recovers or an operator triggers it.
                        trigger = node.consecutive_failures == self.config.failure_threshold;
                    }
                }
            }

            let result = HealthCheckResult {
                node_id: node.id.clone(),
                cpu_ok,
                memory_ok,
                connections_ok,
                latency_ok,
                failed_checks,
                status: node.status,
                consecutive_failures: node.consecutive_failures,
                timestamp: now,
                failover: None,
            };
            (result, (node.id.clone(), from, node.status), trigger)
        })?;

        self.publish_transitions(service, vec![transition]);

        if trigger {
            let reason = format!(
                "{} consecutive failed health checks ({} of 4 checks failing)",
                result.consecutive_failures, result.failed_checks
            );
            let event = self.failover(service, node_id, &reason)?;
            if let Some(status) = self.node(service, node_id).ok().map(|n| n.status) {
                result.status = status;
            }
            result.failover = Some(event);
        }
        Ok(result)
    }

    /// Check every node of every service.
    pub fn check_all(&self) -> Vec<HealthCheckResult> {
        let mut targets: Vec<(String, String)> = self
            .groups
            .iter()
            .flat_map(|g| {
                let service = g.key().clone();
                g.nodes
                    .iter()
                    .map(|n| (service.clone(), n.id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        targets.sort();

        targets
            .iter()
            .filter_map(|(service, node)| match self.check_health(service, node) {
                Ok(result) => Some(result),
                // Deregistered since the list was taken.
                Err(_) => None,
            })
            .collect()
    }

    /// Pick a node to serve a request: Healthy nodes first, Degraded only
    /// when no Healthy node exists. `None` when nothing is serving.
    pub fn get_healthy_node(&self, service: &str) -> ContinuityResult<Option<ServiceNode>> {
        let group = self
            .groups
            .get(service)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Service, service))?;

        let healthy: Vec<&ServiceNode> = group
            .nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Healthy)
            .collect();
        let candidates = if healthy.is_empty() {
            group
                .nodes
                .iter()
                .filter(|n| n.status == NodeStatus::Degraded)
                .collect()
        } else {
            healthy
        };

        Ok(group
            .balancer
            .select(&candidates)
            .map(|i| candidates[i].clone()))
    }

    /// Move a failing node out of service and promote a peer.
    ///
    /// Fails with [`ContinuityError::NoHealthyStandby`] when no peer is
    /// Healthy or Degraded; the attempt is still recorded in the history and
    /// no node is changed.
    pub fn trigger_failover(
        &self,
        service: &str,
        failed_node: &str,
        reason: &str,
    ) -> ContinuityResult<FailoverEvent> {
        let event = self.failover(service, failed_node, reason)?;
        if event.success {
            Ok(event)
        } else {
            Err(ContinuityError::NoHealthyStandby(format!("{}/{}", service, failed_node)))
        }
    }

    fn failover(&self, service: &str, failed_node: &str, reason: &str) -> ContinuityResult<FailoverEvent> {
        let start = Instant::now();
        let mut group = self
            .groups
            .get_mut(service)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Service, service))?;
        let failed = group
            .position(failed_node)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Node, failed_node))?;

        let mut transitions = Vec::new();
        let target = group.takeover_candidate(failed_node);
        if let Some(target) = target {
            if group.nodes[failed].is_primary {
                group.nodes[failed].is_primary = false;
                group.nodes[target].is_primary = true;
            }
            let node = &mut group.nodes[failed];
            transitions.push((node.id.clone(), node.status, NodeStatus::Offline));
            node.status = NodeStatus::Offline;
        }
        let to_node = target.map(|t| group.nodes[t].id.clone());
        drop(group);

        let event = FailoverEvent {
            id: Uuid::new_v4(),
            service: service.to_string(),
            from_node: failed_node.to_string(),
            to_node,
            reason: reason.to_string(),
            duration_ms: as_millis_f64(start.elapsed()),
            success: target.is_some(),
            timestamp: now_millis(),
        };

        self.publish_transitions(service, transitions);
        self.finish_failover(&event);
        Ok(event)
    }

    fn finish_failover(&self, event: &FailoverEvent) {
        if event.success {
            tracing::warn!(
                service = %event.service,
                from = %event.from_node,
                to = ?event.to_node,
                reason = %event.reason,
                "Node failover completed"
            );
        } else {
            tracing::error!(
                service = %event.service,
                from = %event.from_node,
                reason = %event.reason,
                "Node failover failed: no healthy standby"
            );
        }
        metrics::record_node_failover(&event.service, event.success);

        {
            let mut history = self.history.lock();
            if history.len() >= self.config.history_capacity.max(1) {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        self.events.publish(ControlEvent::NodeFailover {
            service: event.service.clone(),
            from_node: event.from_node.clone(),
            to_node: event.to_node.clone(),
            reason: event.reason.clone(),
            success: event.success,
        });
    }

    /// Bounce a node: Stopping, then Starting, then Healthy with counters
    /// and connections reset.
    pub async fn restart_node(&self, service: &str, node_id: &str) -> ContinuityResult<ServiceNode> {
        let delay = Duration::from_millis(self.config.restart_delay_ms);

        for status in [NodeStatus::Stopping, NodeStatus::Starting] {
            let transition = self.with_node(service, node_id, |node| {
                let from = node.status;
                node.status = status;
                (node.id.clone(), from, status)
            })?;
            self.publish_transitions(service, vec![transition]);
            time::sleep(delay).await;
        }

        let (node, transition) = self.with_node(service, node_id, |node| {
            let from = node.status;
            node.status = NodeStatus::Healthy;
            node.consecutive_failures = 0;
            node.current_connections = 0;
            node.last_health_check = Some(now_millis());
            (node.clone(), (node.id.clone(), from, NodeStatus::Healthy))
        })?;
        self.publish_transitions(service, vec![transition]);
        tracing::info!(service = %service, node = %node_id, "Node restarted");
        Ok(node)
    }

    pub fn predict_failures(&self) -> Vec<FailurePrediction> {
        let nodes: Vec<ServiceNode> = self
            .groups
            .iter()
            .flat_map(|g| g.nodes.clone())
            .collect();
        prediction::predict(&nodes, self.config.failure_threshold)
    }

    pub fn service_status(&self, service: &str) -> ContinuityResult<ServiceStatus> {
        let group = self
            .groups
            .get(service)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Service, service))?;
        let count = |status: NodeStatus| group.nodes.iter().filter(|n| n.status == status).count();

        Ok(ServiceStatus {
            service: service.to_string(),
            algorithm: self.config.algorithm,
            total_nodes: group.nodes.len(),
            healthy: count(NodeStatus::Healthy),
            degraded: count(NodeStatus::Degraded),
            unhealthy: count(NodeStatus::Unhealthy),
            offline: count(NodeStatus::Offline),
            maintenance: count(NodeStatus::Maintenance),
            primary: group.primary().map(|n| n.id.clone()),
            total_connections: group.nodes.iter().map(|n| n.current_connections as u64).sum(),
            total_capacity: group.nodes.iter().map(|n| n.max_connections as u64).sum(),
            nodes: group.nodes.clone(),
        })
    }

    pub fn node(&self, service: &str, node_id: &str) -> ContinuityResult<ServiceNode> {
        self.with_node(service, node_id, |node| node.clone())
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.groups.iter().map(|g| g.key().clone()).collect();
        services.sort();
        services
    }

    /// Most recent failover events, newest first.
    pub fn failover_history(&self, limit: usize) -> Vec<FailoverEvent> {
        self.history.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    fn with_node<T>(
        &self,
        service: &str,
        node_id: &str,
        f: impl FnOnce(&mut ServiceNode) -> T,
    ) -> ContinuityResult<T> {
        let mut group = self
            .groups
            .get_mut(service)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Service, service))?;
        let node = group
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Node, node_id))?;
        Ok(f(node))
    }

    fn publish_transitions(&self, service: &str, transitions: Vec<Transition>) {
        for (node, from, to) in transitions {
            metrics::record_node_status(service, &node, to);
            if from == to {
                continue;
            }
            tracing::info!(service = %service, node = %node, from = %from, to = %to, "Node status changed");
            self.events.publish(ControlEvent::NodeStatusChanged {
                service: service.to_string(),
                node,
                from,
                to,
            });
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("High-availability manager disabled");
            return;
        }

        tracing::info!(
            interval = self.config.check_interval_secs,
            services = self.groups.len(),
            algorithm = %self.config.algorithm,
            "High-availability manager starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.check_interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let results = self.check_all();
                    let failovers = results.iter().filter(|r| r.failover.is_some()).count();
                    tracing::debug!(checked = results.len(), failovers, "Node health checks complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!("High-availability manager received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> HighAvailabilityManager {
        HighAvailabilityManager::new(AvailabilityConfig::default(), EventBus::default())
    }

    fn node(id: &str) -> ServiceNode {
        ServiceNode::new(id, "api", "10.0.0.1", 8080)
    }

    fn overloaded() -> NodeMetrics {
        NodeMetrics {
            cpu_usage: 95.0,
            memory_usage: 95.0,
            current_connections: 0,
            latency_ms: 10.0,
        }
    }

    fn primaries(manager: &HighAvailabilityManager) -> usize {
        manager
            .service_status("api")
            .unwrap()
            .nodes
            .iter()
            .filter(|n| n.is_primary)
            .count()
    }

    #[test]
    fn test_check_classification() {
        let manager = manager();
        manager.register_node(node("a"));

        let result = manager.check_health("api", "a").unwrap();
        assert_eq!(result.status, NodeStatus::Healthy);
        assert_eq!(result.failed_checks, 0);

        manager
            .update_metrics("api", "a", NodeMetrics { cpu_usage: 90.0, ..Default::default() })
            .unwrap();
        let result = manager.check_health("api", "a").unwrap();
        assert_eq!(result.status, NodeStatus::Degraded);
        assert!(!result.cpu_ok);

        manager.update_metrics("api", "a", overloaded()).unwrap();
        let result = manager.check_health("api", "a").unwrap();
        assert_eq!(result.status, NodeStatus::Unhealthy);
        assert_eq!(result.failed_checks, 2);
        assert_eq!(result.consecutive_failures, 2);

        manager.update_metrics("api", "a", NodeMetrics::default()).unwrap();
        let result = manager.check_health("api", "a").unwrap();
        assert_eq!(result.status, NodeStatus::Healthy);
        assert_eq!(result.consecutive_failures, 0);
    }

    #[test]
    fn test_connection_capacity_check() {
        let manager = manager();
        manager.register_node(node("a").with_max_connections(100));
        manager
            .update_metrics("api", "a", NodeMetrics { current_connections: 95, ..Default::default() })
            .unwrap();
        let result = manager.check_health("api", "a").unwrap();
        assert!(!result.connections_ok);
        assert_eq!(result.status, NodeStatus::Degraded);
    }

    #[test]
    fn test_auto_failover_moves_primary() {
        let manager = manager();
        manager.register_node(node("a").primary());
        manager.register_node(node("b"));
        manager.update_metrics("api", "a", overloaded()).unwrap();

        assert!(manager.check_health("api", "a").unwrap().failover.is_none());
        assert!(manager.check_health("api", "a").unwrap().failover.is_none());
        let result = manager.check_health("api", "a").unwrap();

        let event = result.failover.expect("third failure triggers failover");
        assert!(event.success);
        assert_eq!(event.to_node.as_deref(), Some("b"));
        assert_eq!(result.status, NodeStatus::Offline);

        let status = manager.service_status("api").unwrap();
        assert_eq!(status.primary.as_deref(), Some("b"));
        assert_eq!(primaries(&manager), 1);

        // Offline stays Offline, and does not fail over again.
        let result = manager.check_health("api", "a").unwrap();
        assert_eq!(result.status, NodeStatus::Offline);
        assert!(result.failover.is_none());
        assert_eq!(manager.failover_history(10).len(), 1);
    }

    #[test]
    fn test_failover_without_target_changes_nothing() {
        let manager = manager();
        manager.register_node(node("a").primary());
        let mut b = node("b");
        b.status = NodeStatus::Unhealthy;
        manager.register_node(b);

        let err = manager.trigger_failover("api", "a", "operator request").unwrap_err();
        assert!(matches!(err, ContinuityError::NoHealthyStandby(_)));

        let a = manager.node("api", "a").unwrap();
        assert!(a.is_primary);
        assert_eq!(a.status, NodeStatus::Healthy);
        let history = manager.failover_history(1);
        assert!(!history[0].success);
    }

    #[test]
    fn test_single_primary_on_register() {
        let manager = manager();
        assert!(manager.register_node(node("a").primary()));
        assert!(manager.register_node(node("b").primary()));
        assert!(!manager.register_node(node("a")));
        assert_eq!(primaries(&manager), 1);
        assert!(manager.node("api", "a").unwrap().is_primary);
    }

    #[test]
    fn test_deregister_primary_promotes_peer() {
        let manager = manager();
        manager.register_node(node("a").primary());
        manager.register_node(node("b"));

        manager.deregister_node("api", "a").unwrap();
        assert!(manager.node("api", "b").unwrap().is_primary);

        manager.deregister_node("api", "b").unwrap();
        assert!(manager.services().is_empty());
        assert!(matches!(
            manager.get_healthy_node("api"),
            Err(ContinuityError::UnknownEntity { kind: EntityKind::Service, .. })
        ));
    }

    #[test]
    fn test_selection_prefers_healthy_then_degraded() {
        let manager = manager();
        let mut degraded = node("a");
        degraded.status = NodeStatus::Degraded;
        manager.register_node(degraded);
        manager.register_node(node("b"));

        for _ in 0..20 {
            assert_eq!(manager.get_healthy_node("api").unwrap().unwrap().id, "b");
        }

        manager.set_maintenance("api", "b", true).unwrap();
        assert_eq!(manager.get_healthy_node("api").unwrap().unwrap().id, "a");

        manager.set_maintenance("api", "a", true).unwrap();
        assert!(manager.get_healthy_node("api").unwrap().is_none());
    }

    #[test]
    fn test_maintenance_skips_checks() {
        let manager = manager();
        manager.register_node(node("a"));
        manager.set_maintenance("api", "a", true).unwrap();
        manager.update_metrics("api", "a", overloaded()).unwrap();
        for _ in 0..5 {
            let result = manager.check_health("api", "a").unwrap();
            assert_eq!(result.status, NodeStatus::Maintenance);
            assert_eq!(result.consecutive_failures, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_node() {
        let manager = manager();
        let mut rx = manager.subscribe();
        manager.register_node(node("a"));
        manager.update_metrics("api", "a", overloaded()).unwrap();
        manager.check_health("api", "a").unwrap();

        let node = manager.restart_node("api", "a").await.unwrap();
        assert_eq!(node.status, NodeStatus::Healthy);
        assert_eq!(node.consecutive_failures, 0);

        let mut seen = Vec::new();
        while let Ok(ControlEvent::NodeStatusChanged { to, .. }) = rx.try_recv() {
            seen.push(to);
        }
        assert_eq!(
            seen,
            vec![
                NodeStatus::Unhealthy,
                NodeStatus::Stopping,
                NodeStatus::Starting,
                NodeStatus::Healthy
            ]
        );
    }

    #[test]
    fn test_predict_failures() {
        let manager = manager();
        manager.register_node(node("a"));
        manager.register_node(node("b"));
        manager.update_metrics("api", "a", overloaded()).unwrap();

        let predictions = manager.predict_failures();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].node_id, "a");
    }

    #[test]
    fn test_failed_failover_not_repeated_every_check() {
        let manager = manager();
        let mut rx = manager.subscribe();
        manager.register_node(node("solo").primary());
        manager.update_metrics("api", "solo", overloaded()).unwrap();

        for _ in 0..10 {
            manager.check_health("api", "solo").unwrap();
        }

        let history = manager.failover_history(100);
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);

        let mut failovers = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ControlEvent::NodeFailover { .. }) {
                failovers += 1;
            }
        }
        assert_eq!(failovers, 1);

        // Recovery starts a new streak, which may fail over again.
        manager.update_metrics("api", "solo", NodeMetrics::default()).unwrap();
        manager.check_health("api", "solo").unwrap();
        manager.update_metrics("api", "solo", overloaded()).unwrap();
        for _ in 0..3 {
            manager.check_health("api", "solo").unwrap();
        }
        assert_eq!(manager.failover_history(100).len(), 2);
    }
}
