//! Active dependency health monitor.
//!
//! # Responsibilities
//! - Periodically probe every registered dependency, concurrently
//! - Update per-dependency health state from each outcome
//! - Aggregate each cycle into a snapshot for uptime reporting

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time;

use crate::clock::now_millis;
use crate::config::HealthMonitorConfig;
use crate::error::{ContinuityError, ContinuityResult, EntityKind};
use crate::events::{ControlEvent, EventBus};
use crate::health::history::{HealthSnapshot, SnapshotHistory, UptimeReport};
use crate::health::state::{HealthStatus, HealthThresholds, ServiceHealth};
use crate::observability::metrics;
use crate::probe::Probe;
use crate::resilience::probe_with_timeout;

pub struct HealthMonitor {
    registry: DashMap<String, ServiceHealth>,
    history: Mutex<SnapshotHistory>,
    probe: Arc<dyn Probe>,
    config: HealthMonitorConfig,
    thresholds: HealthThresholds,
    events: EventBus,
}

impl HealthMonitor {
    pub fn new(config: HealthMonitorConfig, probe: Arc<dyn Probe>, events: EventBus) -> Self {
        let history = SnapshotHistory::new(
            config.fine_capacity(),
            config.hourly_capacity,
            config.fold_every,
        );
        Self {
            registry: DashMap::new(),
            history: Mutex::new(history),
            probe,
            thresholds: HealthThresholds::from_config(&config),
            config,
            events,
        }
    }

    /// Start monitoring `name`, probed at `target`.
    ///
    /// Returns false if the name was already registered; its target is
    /// updated and its counters are kept.
    pub fn register(&self, name: impl Into<String>, target: impl Into<String>) -> bool {
        let name = name.into();
        let target = target.into();
        if let Some(mut existing) = self.registry.get_mut(&name) {
            existing.target = target;
            return false;
        }
        tracing::info!(dependency = %name, target = %target, "Dependency registered");
        self.registry
            .insert(name.clone(), ServiceHealth::new(name, target));
        true
    }

    pub fn unregister(&self, name: &str) -> ContinuityResult<ServiceHealth> {
        let (_, health) = self
            .registry
            .remove(name)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Dependency, name))?;
        tracing::info!(dependency = %name, "Dependency unregistered");
        Ok(health)
    }

    pub fn service_health(&self, name: &str) -> ContinuityResult<ServiceHealth> {
        self.registry
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Dependency, name))
    }

    /// Every registered dependency, sorted by name.
    pub fn services(&self) -> Vec<ServiceHealth> {
        let mut services: Vec<ServiceHealth> =
            self.registry.iter().map(|r| r.value().clone()).collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Probe every dependency once and record the resulting snapshot.
    ///
    /// Probes are issued concurrently, each under its own deadline; a
    /// timeout counts as a failure. Never fails.
    pub async fn run_cycle(&self) -> HealthSnapshot {
        let targets: Vec<(String, String)> = self
            .registry
            .iter()
            .map(|r| (r.key().clone(), r.value().target.clone()))
            .collect();

        let timeout = Duration::from_millis(self.config.probe_timeout_ms);
        let probes = targets.iter().map(|(_, target)| {
            probe_with_timeout(self.probe.as_ref(), target, timeout)
        });
        let outcomes = join_all(probes).await;

        let now = now_millis();
        for ((name, _), outcome) in targets.iter().zip(outcomes) {
            self.apply(name, outcome, now);
        }

        let snapshot = self.current_snapshot();
        self.history.lock().push(snapshot.clone());
        tracing::debug!(
            total = snapshot.total,
            healthy = snapshot.healthy,
            degraded = snapshot.degraded,
            unhealthy = snapshot.unhealthy,
            overall = %snapshot.overall,
            "Health cycle complete"
        );
        snapshot
    }

    fn apply(&self, name: &str, outcome: ContinuityResult<Duration>, now: u64) {
        // Unregistered while its probe was in flight.
        let Some(mut health) = self.registry.get_mut(name) else {
            return;
        };

        let previous = health.status;
        let status = match &outcome {
            Ok(latency) => {
                metrics::record_probe_latency(name, *latency);
                health.record_success(*latency, &self.thresholds, now)
            }
            Err(e) => {
                tracing::debug!(dependency = %name, error = %e, failures = health.consecutive_failures + 1, "Probe failed");
                health.record_failure(e, &self.thresholds, now)
            }
        };
        drop(health);

        metrics::record_dependency_status(name, status);
        if status != previous {
            tracing::info!(dependency = %name, from = %previous, to = %status, "Dependency status changed");
            self.events.publish(ControlEvent::DependencyStatusChanged {
                name: name.to_string(),
                from: previous,
                to: status,
            });
        }
    }

    /// Aggregate of the current registry state (not recorded in history).
    pub fn current_snapshot(&self) -> HealthSnapshot {
        let services = self.services();
        HealthSnapshot::from_services(&services, now_millis())
    }

    /// Most recent snapshot recorded by a probe cycle.
    pub fn latest_snapshot(&self) -> Option<HealthSnapshot> {
        self.history.lock().latest().cloned()
    }

    pub fn hourly_snapshots(&self) -> Vec<HealthSnapshot> {
        self.history.lock().hourly().cloned().collect()
    }

    pub fn uptime_report(&self, window_hours: u32) -> UptimeReport {
        let snapshots = self.history.lock().window(window_hours);
        UptimeReport::build(window_hours, &snapshots, &self.services())
    }

    /// Dependencies whose status is not Healthy.
    pub fn failing(&self) -> Vec<ServiceHealth> {
        self.services()
            .into_iter()
            .filter(|s| s.status != HealthStatus::Healthy)
            .collect()
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Health monitor disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            dependencies = self.registry.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
