//! Redundancy manager.
//!
//! # Responsibilities
//! - Own every connection pool
//! - Heartbeat: refresh replica health, reconnect with backoff, fail over
//! - Sync: run replication passes for hot pools and keep the ledger
//!
//! No pool entry is held across an await point: each step reads what it
//! needs, releases the entry, probes, then re-acquires the entry to apply
//! the outcome. A pool removed mid-heartbeat is simply skipped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;
use uuid::Uuid;

use crate::clock::{as_millis_f64, now_millis};
use crate::config::RedundancyConfig;
use crate::error::{ContinuityError, ContinuityResult, EntityKind};
use crate::events::{ControlEvent, EventBus};
use crate::observability::metrics;
use crate::probe::{Probe, Replicator};
use crate::redundancy::instance::{ConnectionState, InstanceRole, ServiceInstance};
use crate::redundancy::pool::{ConnectionPool, PoolStatus, RedundancyMode};
use crate::redundancy::sync::SyncEvent;
use crate::resilience::{probe_with_timeout, BackoffPolicy};

pub struct RedundancyManager {
    pools: DashMap<String, ConnectionPool>,
    probe: Arc<dyn Probe>,
    replicator: Arc<dyn Replicator>,
    config: RedundancyConfig,
    backoff: BackoffPolicy,
    events: EventBus,
}

/// What a heartbeat needs to know about a pool, copied out of the entry.
struct PoolPlan {
    mode: RedundancyMode,
    primary: (String, String),
    secondary: Option<(String, String)>,
    standbys: Vec<(String, String)>,
}

impl RedundancyManager {
    pub fn new(
        config: RedundancyConfig,
        probe: Arc<dyn Probe>,
        replicator: Arc<dyn Replicator>,
        events: EventBus,
    ) -> Self {
        Self {
            pools: DashMap::new(),
            probe,
            replicator,
            backoff: BackoffPolicy::from_config(&config),
            config,
            events,
        }
    }

    /// Create a pool. Returns false if a pool with this name already exists.
    pub fn create_pool(
        &self,
        name: impl Into<String>,
        mode: RedundancyMode,
        primary: impl Into<String>,
        secondary: Option<String>,
    ) -> bool {
        let name = name.into();
        if self.pools.contains_key(&name) {
            return false;
        }
        let pool = ConnectionPool::new(
            name.clone(),
            mode,
            primary,
            secondary,
            self.config.sync_history_capacity,
        );
        tracing::info!(pool = %name, mode = %mode, "Connection pool created");
        self.pools.insert(name, pool);
        true
    }

    pub fn remove_pool(&self, name: &str) -> ContinuityResult<PoolStatus> {
        let (_, pool) = self
            .pools
            .remove(name)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Pool, name))?;
        tracing::info!(pool = %name, "Connection pool removed");
        Ok(PoolStatus::from(&pool))
    }

    /// Attach a standby endpoint, returning its instance id.
    pub fn add_standby(&self, pool: &str, endpoint: impl Into<String>) -> ContinuityResult<String> {
        let mut entry = self
            .pools
            .get_mut(pool)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Pool, pool))?;
        Ok(entry.add_standby(endpoint).id.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// The active instance if it is healthy, `None` if the pool currently
    /// has nothing to serve from.
    pub fn get_connection(&self, pool: &str) -> ContinuityResult<Option<ServiceInstance>> {
        let entry = self
            .pools
            .get(pool)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Pool, pool))?;
        let active = entry.active();
        Ok(active.is_available().then(|| active.clone()))
    }

    pub fn pool_status(&self, pool: &str) -> ContinuityResult<PoolStatus> {
        self.pools
            .get(pool)
            .map(|p| PoolStatus::from(p.value()))
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Pool, pool))
    }

    /// Status of every pool, sorted by name.
    pub fn status(&self) -> Vec<PoolStatus> {
        let mut status: Vec<PoolStatus> =
            self.pools.iter().map(|p| PoolStatus::from(p.value())).collect();
        status.sort_by(|a, b| a.name.cmp(&b.name));
        status
    }

    pub fn sync_history(&self, pool: &str) -> ContinuityResult<Vec<SyncEvent>> {
        self.pools
            .get(pool)
            .map(|p| p.sync.events().cloned().collect())
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Pool, pool))
    }

    /// Switch a pool to its secondary. Returns false, changing nothing, if
    /// the secondary is not healthy.
    pub fn manual_failover(&self, pool: &str) -> ContinuityResult<bool> {
        if !self.pools.contains_key(pool) {
            return Err(ContinuityError::unknown(EntityKind::Pool, pool));
        }
        Ok(self.fail_over(pool, true))
    }

    /// Re-check the primary and, if it is healthy now, make it active again.
    pub async fn manual_failback(&self, pool: &str) -> ContinuityResult<bool> {
        let (id, endpoint) = {
            let entry = self
                .pools
                .get(pool)
                .ok_or_else(|| ContinuityError::unknown(EntityKind::Pool, pool))?;
            (entry.primary.id.clone(), entry.primary.endpoint.clone())
        };
        self.check_instance(pool, &id, &endpoint).await;
        Ok(self.fail_back(pool, true))
    }

    /// Connect every primary and secondary once. Cold secondaries are
    /// connected on demand when the primary fails.
    pub async fn connect_all(&self) {
        for name in self.pool_names() {
            let Some(plan) = self.plan(&name) else {
                continue;
            };
            let (id, endpoint) = &plan.primary;
            self.check_instance(&name, id, endpoint).await;
            if let Some((id, endpoint)) = &plan.secondary {
                if plan.mode != RedundancyMode::ColdStandby {
                    self.check_instance(&name, id, endpoint).await;
                }
            }
            for (id, endpoint) in &plan.standbys {
                self.refresh_standby(&name, id, endpoint).await;
            }
        }
    }

    pub fn disconnect_all(&self) {
        for name in self.pool_names() {
            let ids: Vec<String> = match self.pools.get(&name) {
                Some(pool) => pool.instances().map(|i| i.id.clone()).collect(),
                None => continue,
            };
            for id in ids {
                self.update_instance(&name, &id, ServiceInstance::disconnect);
            }
        }
        tracing::info!("All pool connections closed");
    }

    /// One heartbeat pass over every pool.
    pub async fn heartbeat_cycle(&self) {
        for name in self.pool_names() {
            self.heartbeat_pool(&name).await;
        }
    }

    async fn heartbeat_pool(&self, name: &str) {
        let Some(plan) = self.plan(name) else {
            return;
        };

        let (id, endpoint) = &plan.primary;
        let primary_healthy = self.check_instance(name, id, endpoint).await;

        if let Some((id, endpoint)) = &plan.secondary {
            if plan.mode.checks_secondary() || !primary_healthy || self.is_on_secondary(name) {
                self.check_instance(name, id, endpoint).await;
            }
        }

        for (id, endpoint) in &plan.standbys {
            self.refresh_standby(name, id, endpoint).await;
        }

        self.reconcile(name, primary_healthy);
    }

    /// Decide whether the pool should move after a heartbeat.
    fn reconcile(&self, name: &str, primary_healthy: bool) {
        let Some((on_secondary, secondary_available)) = self.pools.get(name).map(|p| {
            (
                p.is_on_secondary(),
                p.secondary.as_ref().is_some_and(|s| s.is_available()),
            )
        }) else {
            return;
        };

        if !on_secondary && !primary_healthy && self.config.auto_failover {
            if !self.fail_over(name, false) {
                tracing::error!(
                    pool = %name,
                    error = %ContinuityError::NoHealthyStandby(name.to_string()),
                    "Primary unhealthy and failover impossible"
                );
            }
        } else if on_secondary && primary_healthy {
            // A dead secondary goes back to a live primary regardless of auto_failback.
            if self.config.auto_failback || !secondary_available {
                self.fail_back(name, false);
            }
        }
    }

    fn fail_over(&self, name: &str, manual: bool) -> bool {
        let Some(mut pool) = self.pools.get_mut(name) else {
            return false;
        };
        let from = pool.active_instance_id().to_string();
        if !pool.fail_over(now_millis()) {
            tracing::warn!(pool = %name, manual, "Failover refused: no healthy secondary");
            return false;
        }
        let to = pool.active_instance_id().to_string();
        debug_assert!(pool.invariant_holds());
        drop(pool);

        tracing::warn!(pool = %name, from = %from, to = %to, manual, "Pool failed over to secondary");
        metrics::record_pool_failover(name, manual);
        self.events.publish(ControlEvent::PoolFailover {
            pool: name.to_string(),
            from_instance: from,
            to_instance: to,
            manual,
        });
        true
    }

    fn fail_back(&self, name: &str, manual: bool) -> bool {
        let Some(mut pool) = self.pools.get_mut(name) else {
            return false;
        };
        if !pool.fail_back() {
            tracing::debug!(pool = %name, manual, "Failback refused: primary not available");
            return false;
        }
        let instance = pool.active_instance_id().to_string();
        debug_assert!(pool.invariant_holds());
        drop(pool);

        tracing::info!(pool = %name, instance = %instance, manual, "Pool failed back to primary");
        self.events.publish(ControlEvent::PoolFailback {
            pool: name.to_string(),
            instance,
            manual,
        });
        true
    }

    /// One replication pass over every eligible pool.
    pub async fn sync_cycle(&self) {
        for name in self.pool_names() {
            let endpoints = self.pools.get(&name).and_then(|p| {
                p.sync_eligible().then(|| {
                    let secondary = p.secondary.as_ref().map(|s| s.endpoint.clone());
                    (p.primary.endpoint.clone(), secondary)
                })
            });
            let Some((primary, Some(secondary))) = endpoints else {
                continue;
            };

            let started_at = now_millis();
            let start = Instant::now();
            let outcome = self.replicator.replicate(&primary, &secondary).await;
            let elapsed = start.elapsed();

            let (bytes, error) = match outcome {
                Ok(bytes) => (bytes, None),
                Err(e) => {
                    tracing::warn!(pool = %name, error = %e, "Replication pass failed");
                    self.events.publish(ControlEvent::SyncDegraded {
                        scope: name.clone(),
                        detail: e.to_string(),
                    });
                    (0, Some(e.to_string()))
                }
            };
            let success = error.is_none();
            metrics::record_sync_pass(&name, elapsed, success);

            if let Some(mut pool) = self.pools.get_mut(&name) {
                pool.record_sync(SyncEvent {
                    id: Uuid::new_v4(),
                    pool: name.clone(),
                    started_at,
                    duration_ms: as_millis_f64(elapsed),
                    bytes,
                    success,
                    error,
                });
            }
        }
    }

    /// Refresh an instance and return whether it is healthy afterwards.
    ///
    /// A connected instance is probed once; a failed probe, or an instance
    /// that isn't connected, goes through the bounded reconnect sequence.
    async fn check_instance(&self, pool: &str, id: &str, endpoint: &str) -> bool {
        let Some(state) = self.instance_state(pool, id) else {
            return false;
        };

        if state == ConnectionState::Connected {
            match self.probe_endpoint(endpoint).await {
                Ok(latency) => {
                    let now = now_millis();
                    self.update_instance(pool, id, |i| i.mark_success(latency, now));
                    return true;
                }
                Err(e) => {
                    tracing::warn!(pool = %pool, instance = %id, error = %e, "Instance heartbeat failed");
                    let now = now_millis();
                    self.update_instance(pool, id, |i| {
                        i.mark_failure(&e, now);
                        i.state = ConnectionState::Reconnecting;
                    });
                }
            }
        } else {
            self.update_instance(pool, id, |i| i.state = ConnectionState::Connecting);
        }

        self.reconnect(pool, id, endpoint).await
    }

    async fn reconnect(&self, pool: &str, id: &str, endpoint: &str) -> bool {
        let max_attempts = self.config.max_reconnect_attempts.max(1);

        for attempt in 1..=max_attempts {
            let outcome = self.probe_endpoint(endpoint).await;
            let now = now_millis();
            match outcome {
                Ok(latency) => {
                    self.update_instance(pool, id, |i| {
                        i.connection_attempts += 1;
                        i.state = ConnectionState::Connected;
                        i.mark_success(latency, now);
                    });
                    tracing::info!(pool = %pool, instance = %id, attempt, "Instance connected");
                    return true;
                }
                Err(e) => {
                    tracing::debug!(pool = %pool, instance = %id, attempt, error = %e, "Connect attempt failed");
                    self.update_instance(pool, id, |i| {
                        i.connection_attempts += 1;
                        i.mark_failure(&e, now);
                    });
                }
            }

            if attempt < max_attempts {
                time::sleep(self.backoff.delay(attempt)).await;
            }
        }

        let exhausted = ContinuityError::ReconnectExhausted {
            instance: id.to_string(),
            attempts: max_attempts,
        };
        tracing::error!(pool = %pool, instance = %id, error = %exhausted, "Instance marked failed");
        self.update_instance(pool, id, |i| {
            i.state = ConnectionState::Failed;
            i.healthy = false;
            i.last_error = Some(exhausted.to_string());
        });
        false
    }

    /// Standbys get a health refresh only; they are never reconnected.
    async fn refresh_standby(&self, pool: &str, id: &str, endpoint: &str) {
        let outcome = self.probe_endpoint(endpoint).await;
        let now = now_millis();
        self.update_instance(pool, id, |i| match &outcome {
            Ok(latency) => {
                i.state = ConnectionState::Connected;
                i.mark_success(*latency, now);
            }
            Err(e) => {
                i.state = ConnectionState::Disconnected;
                i.mark_failure(e, now);
            }
        });
    }

    async fn probe_endpoint(&self, endpoint: &str) -> ContinuityResult<Duration> {
        let timeout = Duration::from_millis(self.config.probe_timeout_ms);
        probe_with_timeout(self.probe.as_ref(), endpoint, timeout).await
    }

    /// Mutate one instance and report state or health changes.
    fn update_instance<F>(&self, pool: &str, id: &str, f: F)
    where
        F: FnOnce(&mut ServiceInstance),
    {
        let Some(mut entry) = self.pools.get_mut(pool) else {
            return;
        };
        let Some(instance) = entry.instance_mut(id) else {
            return;
        };
        let before = (instance.state, instance.healthy);
        f(instance);
        let (state, healthy) = (instance.state, instance.healthy);
        drop(entry);

        if before == (state, healthy) {
            return;
        }
        tracing::info!(pool = %pool, instance = %id, state = %state, healthy, "Instance state changed");
        metrics::record_instance_health(pool, id, healthy);
        self.events.publish(ControlEvent::InstanceStateChanged {
            pool: pool.to_string(),
            instance: id.to_string(),
            state,
            healthy,
        });
    }

    fn instance_state(&self, pool: &str, id: &str) -> Option<ConnectionState> {
        let entry = self.pools.get(pool)?;
        let state = entry.instances().find(|i| i.id == id).map(|i| i.state);
        state
    }

    fn is_on_secondary(&self, pool: &str) -> bool {
        self.pools.get(pool).is_some_and(|p| p.is_on_secondary())
    }

    fn plan(&self, pool: &str) -> Option<PoolPlan> {
        let entry = self.pools.get(pool)?;
        let pair = |i: &ServiceInstance| (i.id.clone(), i.endpoint.clone());
        Some(PoolPlan {
            mode: entry.mode,
            primary: pair(&entry.primary),
            secondary: entry.secondary.as_ref().map(pair),
            standbys: entry.standbys.iter().map(pair).collect(),
        })
    }

    fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.iter().map(|p| p.key().clone()).collect();
        names.sort();
        names
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Redundancy manager disabled");
            return;
        }

        tracing::info!(
            pools = self.pools.len(),
            heartbeat = self.config.heartbeat_interval_secs,
            sync = self.config.sync_interval_secs,
            sync_enabled = self.config.sync_enabled,
            "Redundancy manager starting"
        );

        let mut heartbeat = time::interval(Duration::from_secs(self.config.heartbeat_interval_secs));
        let mut sync = time::interval(Duration::from_secs(self.config.sync_interval_secs));
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    self.heartbeat_cycle().await;
                }
                _ = sync.tick(), if self.config.sync_enabled => {
                    self.sync_cycle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Redundancy manager received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Role of the instance currently serving a pool.
    pub fn active_role(&self, pool: &str) -> ContinuityResult<InstanceRole> {
        self.pools
            .get(pool)
            .map(|p| p.active().role)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Pool, pool))
    }
}
