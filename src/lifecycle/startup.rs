//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every manager around one shared event bus
//! - Register everything the configuration declares
//! - Start and stop the background loops
//!
//! # Design Decisions
//! - Configuration arrives already validated by the loader
//! - Pools are connected once before the loops start
//! - Stop waits for every loop to finish its current iteration

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::availability::{HighAvailabilityManager, ServiceNode};
use crate::config::ContinuityConfig;
use crate::events::{ControlEvent, EventBus};
use crate::health::HealthMonitor;
use crate::lifecycle::Shutdown;
use crate::probe::{Probe, ReportedReplicator, Replicator};
use crate::redundancy::RedundancyManager;
use crate::region::{MultiRegionEngine, Region};

/// The assembled control plane: four managers, one event bus.
pub struct ControlPlane {
    config: ContinuityConfig,
    events: EventBus,
    health: Arc<HealthMonitor>,
    redundancy: Arc<RedundancyManager>,
    availability: Arc<HighAvailabilityManager>,
    regions: Arc<MultiRegionEngine>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl ControlPlane {
    /// Construct every manager and register the configured entities.
    pub fn build(
        config: ContinuityConfig,
        probe: Arc<dyn Probe>,
        replicator: Arc<dyn Replicator>,
    ) -> Self {
        let events = EventBus::default();

        let health = Arc::new(HealthMonitor::new(
            config.health.clone(),
            probe.clone(),
            events.clone(),
        ));
        for dep in &config.health.dependencies {
            health.register(&dep.name, &dep.target);
        }

        let redundancy = Arc::new(RedundancyManager::new(
            config.redundancy.clone(),
            probe.clone(),
            replicator.clone(),
            events.clone(),
        ));
        for pool in &config.redundancy.pools {
            redundancy.create_pool(&pool.name, pool.mode, &pool.primary, pool.secondary.clone());
            for standby in &pool.standbys {
                if let Err(e) = redundancy.add_standby(&pool.name, standby) {
                    tracing::error!(pool = %pool.name, error = %e, "Failed to add standby");
                }
            }
        }

        let availability = Arc::new(HighAvailabilityManager::new(
            config.availability.clone(),
            events.clone(),
        ));
        for node in &config.availability.nodes {
            availability.register_node(ServiceNode::from(node));
        }

        let regions = Arc::new(MultiRegionEngine::new(
            config.regions.clone(),
            probe,
            replicator,
            events.clone(),
        ));
        for def in &config.regions.regions {
            regions.register_region(Region::from(def));
        }

        tracing::info!(
            dependencies = config.health.dependencies.len(),
            pools = config.redundancy.pools.len(),
            nodes = config.availability.nodes.len(),
            regions = config.regions.regions.len(),
            "Control plane built"
        );

        Self {
            config,
            events,
            health,
            redundancy,
            availability,
            regions,
            shutdown: Shutdown::new(),
            tasks: Vec::new(),
        }
    }

    /// Build a plane with no replication feed.
    ///
    /// Pool sync passes and region sync checks are switched off, so pools and
    /// regions are judged on heartbeats alone and no sync failures are
    /// reported for links nobody measures.
    pub fn without_replication(mut config: ContinuityConfig, probe: Arc<dyn Probe>) -> Self {
        config.redundancy.sync_enabled = false;
        config.regions.sync_enabled = false;
        tracing::info!("No replication feed supplied, sync loops disabled");
        Self::build(config, probe, Arc::new(ReportedReplicator::new()))
    }

    /// Connect every pool once, then spawn the manager loops.
    pub async fn start(&mut self) {
        if self.shutdown.is_triggered() {
            tracing::warn!("Control plane already stopped");
            return;
        }
        if !self.tasks.is_empty() {
            tracing::warn!("Control plane already running");
            return;
        }

        if self.config.redundancy.enabled {
            self.redundancy.connect_all().await;
        }

        self.tasks.push(tokio::spawn(
            self.health.clone().run(self.shutdown.subscribe()),
        ));
        self.tasks.push(tokio::spawn(
            self.redundancy.clone().run(self.shutdown.subscribe()),
        ));
        self.tasks.push(tokio::spawn(
            self.availability.clone().run(self.shutdown.subscribe()),
        ));
        self.tasks.push(tokio::spawn(
            self.regions.clone().run(self.shutdown.subscribe()),
        ));

        tracing::info!(tasks = self.tasks.len(), "Control plane started");
    }

    /// Signal every loop, wait for each to exit, then close pool connections.
    pub async fn stop(&mut self) {
        let notified = self.shutdown.trigger();
        tracing::info!(loops = notified, "Stopping control plane");
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Manager task ended abnormally");
            }
        }
        self.redundancy.disconnect_all();
        tracing::info!("Control plane stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &ContinuityConfig {
        &self.config
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn redundancy(&self) -> &Arc<RedundancyManager> {
        &self.redundancy
    }

    pub fn availability(&self) -> &Arc<HighAvailabilityManager> {
        &self.availability
    }

    pub fn regions(&self) -> &Arc<MultiRegionEngine> {
        &self.regions
    }
}
