//! Multi-region failover engine.
//!
//! # Responsibilities
//! - Keep the region registry and its single primary
//! - Count heartbeat failures and fail over a primary that stops answering
//! - Classify cross-region replication lag
//! - Run ordered, category-by-category cutovers and keep their timeline
//! - Score failover readiness
//!
//! All registry state sits behind one lock so the primary flag can only
//! move in a single step. The lock is never held across an await point.
//!
//! A cutover runs in its own task: once started it always finishes its
//! mutations, even if the caller stops waiting for it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::clock::{age_of, as_millis_f64, now_millis};
use crate::config::RegionConfig;
use crate::error::{ContinuityError, ContinuityResult, EntityKind};
use crate::events::{ControlEvent, EventBus};
use crate::observability::metrics;
use crate::probe::{Probe, ReplicationLag, Replicator};
use crate::resilience::probe_with_timeout;

use super::types::{
    FailoverOutcome, ReadinessReport, Region, RegionHeartbeat, RegionStatus, ServiceCategory,
    ServiceState, SyncReport, SyncStatus, TimelineEntry, TimelineStep,
};

const PRIMARY_WEIGHT: f64 = 0.2;
const STANDBY_WEIGHT: f64 = 0.3;
const IN_SYNC_WEIGHT: f64 = 0.3;
const LAG_DETECTED_WEIGHT: f64 = 0.15;
const HEARTBEAT_WEIGHT: f64 = 0.2;

type Transition = (String, RegionStatus, RegionStatus);

#[derive(Default)]
struct Registry {
    /// Registration order; takeover candidates are searched in this order.
    regions: Vec<Region>,
    heartbeats: VecDeque<RegionHeartbeat>,
    sync_reports: VecDeque<SyncReport>,
    timeline: VecDeque<TimelineEntry>,
}

impl Registry {
    fn find(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.id == id)
    }

    fn position(&self, id: &str) -> ContinuityResult<usize> {
        self.regions
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Region, id))
    }

    fn primary(&self) -> Option<&Region> {
        self.regions.iter().find(|r| r.is_primary)
    }

    /// First Active or Standby region other than `excluded`.
    fn takeover_candidate(&self, excluded: &str) -> Option<String> {
        self.regions
            .iter()
            .find(|r| r.id != excluded && r.status.can_take_over())
            .map(|r| r.id.clone())
    }
}

fn push_bounded<T>(ring: &mut VecDeque<T>, item: T, capacity: usize) {
    while ring.len() >= capacity.max(1) {
        ring.pop_front();
    }
    ring.push_back(item);
}

/// Clears the in-progress flag when a cutover task ends, however it ends.
struct CutoverGuard<'a>(&'a AtomicBool);

impl Drop for CutoverGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Classify a replication measurement.
///
/// Under the lag ceiling with few pending records is in sync, under it with
/// a backlog is still syncing, under twice the ceiling is lagging, and
/// anything beyond is out of sync.
pub fn classify_lag(lag_ms: u64, records_pending: u64, config: &RegionConfig) -> SyncStatus {
    let max_lag = config.max_sync_lag_ms;
    if lag_ms < max_lag {
        if records_pending <= config.max_pending_records {
            SyncStatus::InSync
        } else {
            SyncStatus::Syncing
        }
    } else if lag_ms < max_lag.saturating_mul(2) {
        SyncStatus::LagDetected
    } else {
        SyncStatus::OutOfSync
    }
}

pub struct MultiRegionEngine {
    registry: Mutex<Registry>,
    cutover_running: AtomicBool,
    probe: Arc<dyn Probe>,
    replicator: Arc<dyn Replicator>,
    config: RegionConfig,
    events: EventBus,
}

impl MultiRegionEngine {
    pub fn new(
        config: RegionConfig,
        probe: Arc<dyn Probe>,
        replicator: Arc<dyn Replicator>,
        events: EventBus,
    ) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            cutover_running: AtomicBool::new(false),
            probe,
            replicator,
            config,
            events,
        }
    }

    /// Add a region. Returns false if the id is taken. A second primary is
    /// registered as a standby.
    pub fn register_region(&self, mut region: Region) -> bool {
        let mut registry = self.registry.lock();
        if registry.find(&region.id).is_some() {
            return false;
        }
        if region.is_primary {
            if let Some(existing) = registry.primary() {
                tracing::warn!(
                    region = %region.id,
                    primary = %existing.id,
                    "Primary region already registered, registering as standby"
                );
                region.is_primary = false;
                if region.status == RegionStatus::Active {
                    region.status = RegionStatus::Standby;
                }
            }
        }
        tracing::info!(
            region = %region.id,
            endpoint = %region.endpoint,
            primary = region.is_primary,
            "Region registered"
        );
        registry.regions.push(region);
        true
    }

    /// Remove a region. Regions taking part in a cutover cannot be removed.
    pub fn deregister_region(&self, id: &str) -> ContinuityResult<Region> {
        let mut registry = self.registry.lock();
        let index = registry.position(id)?;
        if registry.regions[index].status == RegionStatus::FailingOver {
            return Err(ContinuityError::FailoverInProgress(id.to_string()));
        }
        let region = registry.regions.remove(index);
        registry.heartbeats.retain(|h| h.region_id != id);
        registry
            .sync_reports
            .retain(|r| r.source != id && r.target != id);
        registry.timeline.retain(|e| !e.involves(id));
        if region.is_primary {
            tracing::warn!(region = %id, "Primary region deregistered, no primary remains");
        } else {
            tracing::info!(region = %id, "Region deregistered");
        }
        Ok(region)
    }

    pub fn region_status(&self, id: &str) -> ContinuityResult<Region> {
        self.registry
            .lock()
            .find(id)
            .cloned()
            .ok_or_else(|| ContinuityError::unknown(EntityKind::Region, id))
    }

    pub fn regions(&self) -> Vec<Region> {
        self.registry.lock().regions.clone()
    }

    pub fn primary_region(&self) -> Option<Region> {
        self.registry.lock().primary().cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Apply one heartbeat.
    ///
    /// Success clears the failure counter and lifts Degraded (and a
    /// non-primary Offline) back to the resting status. Failure counts up;
    /// below the threshold the region is Degraded, at the threshold a
    /// standby goes Offline and a primary is failed over to the first
    /// Active or Standby region. The outcome of such an automatic failover
    /// is returned.
    pub async fn record_heartbeat(
        self: &Arc<Self>,
        heartbeat: RegionHeartbeat,
    ) -> ContinuityResult<Option<FailoverOutcome>> {
        let region_id = heartbeat.region_id.clone();
        let threshold = self.config.heartbeat_failure_threshold;

        let (transition, failover) = {
            let mut registry = self.registry.lock();
            let index = registry.position(&region_id)?;
            let candidate = registry.takeover_candidate(&region_id);
            let region = &mut registry.regions[index];
            let from = region.status;
            let mut failover = None;

            if heartbeat.success {
                region.heartbeat_failures = 0;
                region.last_heartbeat = Some(heartbeat.timestamp);
                if let Some(cpu) = heartbeat.cpu_usage {
                    region.current_load = cpu / 100.0 * region.capacity;
                }
                match region.status {
                    RegionStatus::Degraded => region.status = region.resting_status(),
                    RegionStatus::Offline if !region.is_primary => {
                        region.status = RegionStatus::Standby
                    }
                    _ => {}
                }
            } else {
                region.heartbeat_failures = region.heartbeat_failures.saturating_add(1);
                let settled = !matches!(
                    region.status,
                    RegionStatus::FailingOver | RegionStatus::Maintenance
                );
                if settled && region.heartbeat_failures >= threshold {
                    if region.is_primary {
                        region.status = RegionStatus::Degraded;
                        failover = Some(candidate);
                    } else {
                        region.status = RegionStatus::Offline;
                    }
                } else if settled && region.status != RegionStatus::Offline {
                    region.status = RegionStatus::Degraded;
                }
            }

            let transition = (region_id.clone(), from, region.status);
            push_bounded(&mut registry.heartbeats, heartbeat, self.config.history_capacity);
            (transition, failover)
        };
        self.publish_transitions(vec![transition]);

        match failover {
            None => Ok(None),
            Some(None) => {
                tracing::error!(
                    region = %region_id,
                    error = %ContinuityError::NoHealthyStandby(region_id.clone()),
                    "Primary region unreachable and no region can take over"
                );
                Ok(None)
            }
            Some(Some(target)) => {
                tracing::warn!(from = %region_id, to = %target, threshold, "Primary region unreachable, failing over");
                match self.execute_failover(&region_id, &target, false).await {
                    Ok(outcome) => Ok(Some(outcome)),
                    Err(e) => {
                        tracing::error!(from = %region_id, to = %target, error = %e, "Automatic region failover failed");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Measure replication from `source` to `target` and record the report.
    ///
    /// Lag is looked up by region id. A failed measurement yields a
    /// `SyncFailed` report rather than an error.
    pub async fn check_sync_status(&self, source: &str, target: &str) -> ContinuityResult<SyncReport> {
        {
            let registry = self.registry.lock();
            registry.position(source)?;
            registry.position(target)?;
        }

        let measured = self.replicator.replication_lag(source, target).await;
        let report = self.build_report(source, target, measured);

        let transition = {
            let mut registry = self.registry.lock();
            let transition = registry.find_mut(target).and_then(|region| {
                let from = region.status;
                match (region.status, report.status) {
                    (RegionStatus::Standby, SyncStatus::Syncing) => region.status = RegionStatus::Syncing,
                    (RegionStatus::Syncing, SyncStatus::InSync | SyncStatus::LagDetected) => {
                        region.status = RegionStatus::Standby
                    }
                    _ => {}
                }
                (from != region.status).then(|| (region.id.clone(), from, region.status))
            });
            push_bounded(&mut registry.sync_reports, report.clone(), self.config.history_capacity);
            transition
        };
        self.publish_transitions(transition.into_iter().collect());

        metrics::record_replication_lag(source, target, report.lag_ms);
        match report.status {
            SyncStatus::OutOfSync | SyncStatus::SyncFailed => {
                let detail = report
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("{} lag {} ms", report.status, report.lag_ms));
                tracing::warn!(source = %source, target = %target, status = %report.status, detail = %detail, "Region replication degraded");
                self.events.publish(ControlEvent::SyncDegraded {
                    scope: format!("{}->{}", source, target),
                    detail,
                });
            }
            status => {
                tracing::debug!(source = %source, target = %target, status = %status, lag_ms = report.lag_ms, "Region sync checked");
            }
        }
        Ok(report)
    }

    fn build_report(
        &self,
        source: &str,
        target: &str,
        measured: ContinuityResult<ReplicationLag>,
    ) -> SyncReport {
        let rpo_ms = self.config.rpo_secs.saturating_mul(1000);
        match measured {
            Ok(lag) => {
                let lag_ms = lag.lag.as_millis() as u64;
                SyncReport {
                    source: source.to_string(),
                    target: target.to_string(),
                    timestamp: now_millis(),
                    lag_ms,
                    records_synced: lag.records_synced,
                    records_pending: lag.records_pending,
                    status: classify_lag(lag_ms, lag.records_pending, &self.config),
                    rpo_met: lag_ms <= rpo_ms,
                    error: None,
                }
            }
            Err(e) => SyncReport {
                source: source.to_string(),
                target: target.to_string(),
                timestamp: now_millis(),
                lag_ms: 0,
                records_synced: 0,
                records_pending: 0,
                status: SyncStatus::SyncFailed,
                rpo_met: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Cut traffic over from one region to another, category by category.
    ///
    /// Both regions are FailingOver for the duration. On completion the
    /// source is a non-primary Standby and the target the Active primary
    /// with every service category healthy. Only one cutover runs at a time.
    pub async fn execute_failover(
        self: &Arc<Self>,
        from: &str,
        to: &str,
        manual: bool,
    ) -> ContinuityResult<FailoverOutcome> {
        if self
            .cutover_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ContinuityError::FailoverInProgress(format!("{} -> {}", from, to)));
        }

        let transitions = match self.begin_cutover(from, to) {
            Ok(transitions) => transitions,
            Err(e) => {
                self.cutover_running.store(false, Ordering::Release);
                return Err(e);
            }
        };
        self.publish_transitions(transitions);
        tracing::warn!(from = %from, to = %to, manual, "Region failover started");
        self.events.publish(ControlEvent::RegionFailoverStarted {
            from: from.to_string(),
            to: to.to_string(),
            manual,
        });

        let engine = Arc::clone(self);
        let (from_id, to_id) = (from.to_string(), to.to_string());
        let task = tokio::spawn(async move {
            let _guard = CutoverGuard(&engine.cutover_running);
            engine.run_cutover(&from_id, &to_id, manual).await
        });

        match task.await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ContinuityError::FailoverAborted {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    fn begin_cutover(&self, from: &str, to: &str) -> ContinuityResult<Vec<Transition>> {
        let mut registry = self.registry.lock();
        let source = registry.position(from)?;
        let target = registry.position(to)?;
        if source == target || !registry.regions[target].status.can_take_over() {
            return Err(ContinuityError::NoHealthyStandby(to.to_string()));
        }

        let mut transitions = Vec::with_capacity(2);
        for index in [source, target] {
            let region = &mut registry.regions[index];
            transitions.push((region.id.clone(), region.status, RegionStatus::FailingOver));
            region.status = RegionStatus::FailingOver;
        }
        Ok(transitions)
    }

    async fn run_cutover(&self, from: &str, to: &str, manual: bool) -> FailoverOutcome {
        let started = Instant::now();
        let mut offset_ms = 0;

        for category in ServiceCategory::ALL {
            let step_ms = self.config.cutover_step_ms.saturating_mul(category.weight());
            time::sleep(Duration::from_millis(step_ms)).await;
            offset_ms += step_ms;

            {
                let mut registry = self.registry.lock();
                if let Some(target) = registry.find_mut(to) {
                    target.services.insert(category, ServiceState::Healthy);
                }
                push_bounded(
                    &mut registry.timeline,
                    TimelineEntry {
                        id: Uuid::new_v4(),
                        timestamp: now_millis(),
                        from_region: from.to_string(),
                        to_region: to.to_string(),
                        manual,
                        step: TimelineStep::CategorySwitched { category, offset_ms },
                    },
                    self.config.history_capacity,
                );
            }
            tracing::info!(from = %from, to = %to, category = %category, offset_ms, "Service category switched");
            self.events.publish(ControlEvent::RegionCategorySwitched {
                from: from.to_string(),
                to: to.to_string(),
                category,
            });
        }

        let duration = started.elapsed();
        let duration_ms = duration.as_millis() as u64;
        let rto_met = duration <= Duration::from_secs(self.config.rto_secs);

        let transitions = {
            let mut registry = self.registry.lock();
            let mut transitions = Vec::new();
            for region in registry.regions.iter_mut() {
                let before = region.status;
                if region.id == to {
                    region.is_primary = true;
                    region.status = RegionStatus::Active;
                    region.heartbeat_failures = 0;
                    region.mark_all_services(ServiceState::Healthy);
                } else if region.id == from {
                    region.is_primary = false;
                    region.status = RegionStatus::Standby;
                } else {
                    region.is_primary = false;
                    continue;
                }
                transitions.push((region.id.clone(), before, region.status));
            }
            push_bounded(
                &mut registry.timeline,
                TimelineEntry {
                    id: Uuid::new_v4(),
                    timestamp: now_millis(),
                    from_region: from.to_string(),
                    to_region: to.to_string(),
                    manual,
                    step: TimelineStep::Completed { duration_ms, rto_met },
                },
                self.config.history_capacity,
            );
            transitions
        };
        self.publish_transitions(transitions);

        metrics::record_region_failover(duration, rto_met, manual);
        if rto_met {
            tracing::info!(from = %from, to = %to, duration_ms, "Region failover completed");
        } else {
            tracing::error!(
                from = %from,
                to = %to,
                duration_ms,
                rto_secs = self.config.rto_secs,
                "Region failover completed past recovery-time objective"
            );
        }
        self.events.publish(ControlEvent::RegionFailoverCompleted {
            from: from.to_string(),
            to: to.to_string(),
            duration_ms,
            rto_met,
        });

        FailoverOutcome {
            from: from.to_string(),
            to: to.to_string(),
            manual,
            duration_ms,
            rto_met,
            categories: ServiceCategory::ALL.to_vec(),
        }
    }

    /// Weighted 0..=1 estimate of how cleanly a failover would go now.
    pub fn failover_readiness(&self) -> ReadinessReport {
        let registry = self.registry.lock();
        let mut score = 0.0;
        let mut issues = Vec::new();

        let primary = registry.primary();
        if primary.is_some() {
            score += PRIMARY_WEIGHT;
        } else {
            issues.push("no primary region".to_string());
        }

        let healthy_standbys = registry
            .regions
            .iter()
            .filter(|r| !r.is_primary && r.status.can_take_over())
            .count();
        if healthy_standbys > 0 {
            score += STANDBY_WEIGHT;
        } else {
            issues.push("no healthy standby region".to_string());
        }

        let latest_sync = registry
            .sync_reports
            .iter()
            .rev()
            .find(|r| registry.find(&r.source).is_some() && registry.find(&r.target).is_some())
            .map(|r| r.status);
        match latest_sync {
            Some(SyncStatus::InSync) => score += IN_SYNC_WEIGHT,
            Some(SyncStatus::LagDetected) => {
                score += LAG_DETECTED_WEIGHT;
                issues.push("replication lag detected".to_string());
            }
            Some(status) => issues.push(format!("replication {}", status)),
            None => issues.push("no replication report yet".to_string()),
        }

        let heartbeat_age = primary.and_then(|p| p.last_heartbeat).map(age_of);
        match heartbeat_age {
            Some(age) if age < Duration::from_secs(self.config.heartbeat_freshness_secs) => {
                score += HEARTBEAT_WEIGHT
            }
            Some(age) => issues.push(format!("primary heartbeat {} s old", age.as_secs())),
            None if primary.is_some() => issues.push("no primary heartbeat yet".to_string()),
            None => {}
        }

        let score: f64 = score.clamp(0.0, 1.0);
        let report = ReadinessReport {
            score,
            ready: score >= self.config.readiness_threshold,
            primary: primary.map(|p| p.id.clone()),
            healthy_standbys,
            latest_sync,
            heartbeat_age_secs: heartbeat_age.map(|a| a.as_secs()),
            issues,
        };
        drop(registry);

        metrics::record_readiness(report.score);
        report
    }

    /// Timeline entries, newest first, optionally only those involving `region`.
    pub fn timeline(&self, limit: usize, region: Option<&str>) -> Vec<TimelineEntry> {
        self.registry
            .lock()
            .timeline
            .iter()
            .rev()
            .filter(|e| region.map_or(true, |r| e.involves(r)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sync reports, newest first.
    pub fn sync_reports(&self, limit: usize) -> Vec<SyncReport> {
        self.registry
            .lock()
            .sync_reports
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Heartbeats from one region, newest first.
    pub fn heartbeats(&self, region: &str, limit: usize) -> Vec<RegionHeartbeat> {
        self.registry
            .lock()
            .heartbeats
            .iter()
            .rev()
            .filter(|h| h.region_id == region)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Probe every region endpoint and record the heartbeats.
    pub async fn heartbeat_cycle(self: &Arc<Self>) {
        let targets: Vec<(String, String)> = self
            .registry
            .lock()
            .regions
            .iter()
            .filter(|r| r.status != RegionStatus::Maintenance)
            .map(|r| (r.id.clone(), r.endpoint.clone()))
            .collect();

        let timeout = Duration::from_millis(self.config.probe_timeout_ms);
        let probes = targets
            .iter()
            .map(|(_, endpoint)| probe_with_timeout(self.probe.as_ref(), endpoint, timeout));
        let outcomes = join_all(probes).await;

        for ((id, _), outcome) in targets.into_iter().zip(outcomes) {
            let heartbeat = match outcome {
                Ok(latency) => RegionHeartbeat::success(id, as_millis_f64(latency)),
                Err(e) => RegionHeartbeat::failure(id, e),
            };
            if let Err(e) = self.record_heartbeat(heartbeat).await {
                tracing::debug!(error = %e, "Heartbeat for removed region dropped");
            }
        }
    }

    /// Check replication from the primary to every reachable region.
    pub async fn sync_cycle(&self) {
        let pairs: Vec<(String, String)> = {
            let registry = self.registry.lock();
            let Some(primary) = registry.primary() else {
                return;
            };
            registry
                .regions
                .iter()
                .filter(|r| {
                    !r.is_primary
                        && !matches!(r.status, RegionStatus::Offline | RegionStatus::Maintenance)
                })
                .map(|r| (primary.id.clone(), r.id.clone()))
                .collect()
        };

        for (source, target) in pairs {
            if let Err(e) = self.check_sync_status(&source, &target).await {
                tracing::debug!(source = %source, target = %target, error = %e, "Sync check skipped");
            }
        }
        self.failover_readiness();
    }

    fn publish_transitions(&self, transitions: Vec<Transition>) {
        for (region, from, to) in transitions {
            if from == to {
                continue;
            }
            tracing::info!(region = %region, from = %from, to = %to, "Region status changed");
            self.events.publish(ControlEvent::RegionStatusChanged { region, from, to });
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Multi-region engine disabled");
            return;
        }

        tracing::info!(
            regions = self.registry.lock().regions.len(),
            heartbeat = self.config.heartbeat_interval_secs,
            sync = self.config.sync_check_interval_secs,
            sync_enabled = self.config.sync_enabled,
            "Multi-region engine starting"
        );

        let mut heartbeat = time::interval(Duration::from_secs(self.config.heartbeat_interval_secs));
        let mut sync = time::interval(Duration::from_secs(self.config.sync_check_interval_secs));
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    self.heartbeat_cycle().await;
                }
                _ = sync.tick(), if self.config.sync_enabled => {
                    self.sync_cycle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Multi-region engine received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ReportedReplicator;
    use async_trait::async_trait;

    struct UpProbe;

    #[async_trait]
    impl Probe for UpProbe {
        async fn probe(&self, _target: &str) -> ContinuityResult<Duration> {
            Ok(Duration::from_millis(3))
        }
    }

    fn engine(replicator: Arc<ReportedReplicator>) -> Arc<MultiRegionEngine> {
        let engine = Arc::new(MultiRegionEngine::new(
            RegionConfig::default(),
            Arc::new(UpProbe),
            replicator,
            EventBus::default(),
        ));
        engine.register_region(Region::new("us-east", "us-east.example:443", true));
        engine.register_region(Region::new("us-west", "us-west.example:443", false));
        engine
    }

    #[test]
    fn test_classify_lag() {
        let config = RegionConfig::default();
        assert_eq!(classify_lag(100, 0, &config), SyncStatus::InSync);
        assert_eq!(classify_lag(100, 5000, &config), SyncStatus::Syncing);
        assert_eq!(classify_lag(6000, 0, &config), SyncStatus::LagDetected);
        assert_eq!(classify_lag(10_000, 0, &config), SyncStatus::OutOfSync);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_heartbeat_failures_trigger_failover() {
        let engine = engine(Arc::new(ReportedReplicator::new()));

        for _ in 0..2 {
            let outcome = engine
                .record_heartbeat(RegionHeartbeat::failure("us-east", "timeout"))
                .await
                .unwrap();
            assert!(outcome.is_none());
        }
        assert_eq!(engine.region_status("us-east").unwrap().status, RegionStatus::Degraded);

        let outcome = engine
            .record_heartbeat(RegionHeartbeat::failure("us-east", "timeout"))
            .await
            .unwrap()
            .expect("third failure fails over");
        assert_eq!(outcome.to, "us-west");
        assert!(outcome.rto_met);
        assert_eq!(outcome.duration_ms, 5500);

        let east = engine.region_status("us-east").unwrap();
        let west = engine.region_status("us-west").unwrap();
        assert_eq!(east.status, RegionStatus::Standby);
        assert!(!east.is_primary);
        assert_eq!(west.status, RegionStatus::Active);
        assert!(west.is_primary);
        assert!(west.services.values().all(|s| *s == ServiceState::Healthy));

        let timeline = engine.timeline(20, None);
        assert_eq!(timeline.len(), 8);
        assert!(timeline[0].is_completion());
        let offsets: Vec<u64> = timeline[1..]
            .iter()
            .rev()
            .filter_map(|e| match e.step {
                TimelineStep::CategorySwitched { offset_ms, .. } => Some(offset_ms),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![1500, 2000, 3000, 3500, 4000, 5000, 5500]);
    }

    #[tokio::test]
    async fn test_standby_goes_offline_and_recovers() {
        let engine = engine(Arc::new(ReportedReplicator::new()));
        for _ in 0..3 {
            engine
                .record_heartbeat(RegionHeartbeat::failure("us-west", "refused"))
                .await
                .unwrap();
        }
        assert_eq!(engine.region_status("us-west").unwrap().status, RegionStatus::Offline);
        assert!(engine.primary_region().unwrap().id == "us-east");

        engine
            .record_heartbeat(RegionHeartbeat::success("us-west", 12.0))
            .await
            .unwrap();
        let west = engine.region_status("us-west").unwrap();
        assert_eq!(west.status, RegionStatus::Standby);
        assert_eq!(west.heartbeat_failures, 0);
    }

    #[tokio::test]
    async fn test_sync_report_and_readiness() {
        let replicator = Arc::new(ReportedReplicator::new());
        let engine = engine(replicator.clone());
        engine
            .record_heartbeat(RegionHeartbeat::success("us-east", 5.0))
            .await
            .unwrap();

        replicator.report_lag("us-east", "us-west", Duration::from_millis(200));
        let report = engine.check_sync_status("us-east", "us-west").await.unwrap();
        assert_eq!(report.status, SyncStatus::InSync);
        assert!(report.rpo_met);

        let readiness = engine.failover_readiness();
        assert!((readiness.score - 1.0).abs() < 1e-9);
        assert!(readiness.ready);
        assert!(readiness.issues.is_empty());

        replicator.report_lag("us-east", "us-west", Duration::from_millis(10_000));
        let report = engine.check_sync_status("us-east", "us-west").await.unwrap();
        assert_eq!(report.status, SyncStatus::OutOfSync);
        let readiness = engine.failover_readiness();
        assert!((readiness.score - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_lag_is_sync_failed() {
        let engine = engine(Arc::new(ReportedReplicator::new()));
        let report = engine.check_sync_status("us-east", "us-west").await.unwrap();
        assert_eq!(report.status, SyncStatus::SyncFailed);
        assert!(report.error.is_some());
        assert!(matches!(
            engine.check_sync_status("us-east", "mars").await,
            Err(ContinuityError::UnknownEntity { kind: EntityKind::Region, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cutover_rejected() {
        let engine = engine(Arc::new(ReportedReplicator::new()));
        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.execute_failover("us-east", "us-west", true).await })
        };
        tokio::task::yield_now().await;

        let second = engine.execute_failover("us-west", "us-east", true).await;
        assert!(matches!(second, Err(ContinuityError::FailoverInProgress(_))));
        assert!(matches!(
            engine.deregister_region("us-west"),
            Err(ContinuityError::FailoverInProgress(_))
        ));

        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.manual);
        assert_eq!(engine.primary_region().unwrap().id, "us-west");
    }

    #[tokio::test]
    async fn test_duplicate_primary_registered_as_standby() {
        let engine = engine(Arc::new(ReportedReplicator::new()));
        assert!(engine.register_region(Region::new("eu", "eu.example:443", true)));
        assert!(!engine.register_region(Region::new("eu", "eu.example:443", false)));
        let eu = engine.region_status("eu").unwrap();
        assert!(!eu.is_primary);
        assert_eq!(eu.status, RegionStatus::Standby);
        assert_eq!(engine.regions().iter().filter(|r| r.is_primary).count(), 1);
    }

    #[tokio::test]
    async fn test_deregister_drops_region_history() {
        let replicator = Arc::new(ReportedReplicator::new());
        let engine = engine(replicator.clone());
        engine
            .record_heartbeat(RegionHeartbeat::success("us-east", 5.0))
            .await
            .unwrap();
        engine
            .record_heartbeat(RegionHeartbeat::success("us-west", 7.0))
            .await
            .unwrap();
        replicator.report_lag("us-east", "us-west", Duration::from_millis(100));
        engine.check_sync_status("us-east", "us-west").await.unwrap();
        assert!((engine.failover_readiness().score - 1.0).abs() < 1e-9);

        let removed = engine.deregister_region("us-west").unwrap();
        assert_eq!(removed.id, "us-west");
        assert!(engine.region_status("us-west").is_err());
        assert!(engine.heartbeats("us-west", 10).is_empty());
        assert!(engine
            .sync_reports(10)
            .iter()
            .all(|r| r.source != "us-west" && r.target != "us-west"));
        assert!(engine.regions().iter().all(|r| r.id != "us-west"));

        // A fresh standby that never synced earns no sync bonus.
        engine.register_region(Region::new("eu-central", "eu-central.example:443", false));
        let readiness = engine.failover_readiness();
        assert_eq!(readiness.latest_sync, None);
        assert!((readiness.score - 0.7).abs() < 1e-9);
        assert!(readiness.issues.iter().any(|i| i.contains("no replication report")));
    }

    #[tokio::test]
    async fn test_history_capacity_bounds_rings() {
        let config = RegionConfig {
            history_capacity: 3,
            ..RegionConfig::default()
        };
        let engine = Arc::new(MultiRegionEngine::new(
            config,
            Arc::new(UpProbe),
            Arc::new(ReportedReplicator::new()),
            EventBus::default(),
        ));
        engine.register_region(Region::new("us-east", "us-east.example:443", true));
        engine.register_region(Region::new("us-west", "us-west.example:443", false));

        for _ in 0..10 {
            engine
                .record_heartbeat(RegionHeartbeat::success("us-west", 4.0))
                .await
                .unwrap();
            engine.check_sync_status("us-east", "us-west").await.unwrap();
        }
        assert_eq!(engine.heartbeats("us-west", 100).len(), 3);
        assert_eq!(engine.sync_reports(100).len(), 3);
    }
}
