//! Connection pool: one logical dependency with its replicas.
//!
//! The pool's `active_instance_id` always names either the primary or the
//! secondary. Every failover and failback checks the target is available
//! before moving it, so a pool never switches onto an unhealthy replica.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::redundancy::instance::{InstanceRole, ServiceInstance};
use crate::redundancy::sync::{SyncEvent, SyncLedger};

/// Replication fidelity of the secondary relative to the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedundancyMode {
    /// Continuously synced and continuously checked.
    HotStandby,
    /// Periodically synced out of band.
    WarmStandby,
    /// Unsynced; brought up on demand.
    ColdStandby,
    /// Both replicas serve and stay synced.
    ActiveActive,
    /// Secondary is idle until failover.
    ActivePassive,
}

impl RedundancyMode {
    pub fn requires_secondary(&self) -> bool {
        !matches!(self, RedundancyMode::ColdStandby)
    }

    /// Secondary is probed on every heartbeat.
    pub fn checks_secondary(&self) -> bool {
        matches!(self, RedundancyMode::HotStandby | RedundancyMode::ActiveActive)
    }

    /// Sync loop runs replication passes for this pool.
    pub fn replicates(&self) -> bool {
        self.checks_secondary()
    }
}

impl fmt::Display for RedundancyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RedundancyMode::HotStandby => "hot_standby",
            RedundancyMode::WarmStandby => "warm_standby",
            RedundancyMode::ColdStandby => "cold_standby",
            RedundancyMode::ActiveActive => "active_active",
            RedundancyMode::ActivePassive => "active_passive",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pub name: String,
    pub mode: RedundancyMode,
    pub primary: ServiceInstance,
    pub secondary: Option<ServiceInstance>,
    pub standbys: Vec<ServiceInstance>,
    active_instance_id: String,
    pub last_failover: Option<u64>,
    pub failover_count: u64,
    pub sync: SyncLedger,
}

impl ConnectionPool {
    pub fn new(
        name: impl Into<String>,
        mode: RedundancyMode,
        primary: impl Into<String>,
        secondary: Option<String>,
        sync_capacity: usize,
    ) -> Self {
        let name = name.into();
        let primary = ServiceInstance::new(format!("{}-primary", name), InstanceRole::Primary, primary);
        let secondary = secondary.map(|endpoint| {
            ServiceInstance::new(format!("{}-secondary", name), InstanceRole::Secondary, endpoint)
        });
        Self {
            active_instance_id: primary.id.clone(),
            name,
            mode,
            primary,
            secondary,
            standbys: Vec::new(),
            last_failover: None,
            failover_count: 0,
            sync: SyncLedger::new(sync_capacity),
        }
    }

    pub fn add_standby(&mut self, endpoint: impl Into<String>) -> &ServiceInstance {
        let id = format!("{}-standby-{}", self.name, self.standbys.len() + 1);
        self.standbys
            .push(ServiceInstance::new(id, InstanceRole::Standby, endpoint));
        &self.standbys[self.standbys.len() - 1]
    }

    pub fn active_instance_id(&self) -> &str {
        &self.active_instance_id
    }

    pub fn active(&self) -> &ServiceInstance {
        match &self.secondary {
            Some(secondary) if secondary.id == self.active_instance_id => secondary,
            _ => &self.primary,
        }
    }

    pub fn is_on_secondary(&self) -> bool {
        self.active().role == InstanceRole::Secondary
    }

    /// Every instance: primary, secondary, then standbys.
    pub fn instances(&self) -> impl Iterator<Item = &ServiceInstance> {
        std::iter::once(&self.primary)
            .chain(self.secondary.as_ref())
            .chain(self.standbys.iter())
    }

    pub fn instance_mut(&mut self, id: &str) -> Option<&mut ServiceInstance> {
        if self.primary.id == id {
            return Some(&mut self.primary);
        }
        if let Some(secondary) = self.secondary.as_mut() {
            if secondary.id == id {
                return Some(secondary);
            }
        }
        self.standbys.iter_mut().find(|s| s.id == id)
    }

    /// Move traffic to the secondary. Returns false, leaving the pool
    /// unchanged, if there is no available secondary or it is already active.
    pub fn fail_over(&mut self, now_ms: u64) -> bool {
        let Some(secondary) = self.secondary.as_ref() else {
            return false;
        };
        if !secondary.is_available() || secondary.id == self.active_instance_id {
            return false;
        }
        self.active_instance_id = secondary.id.clone();
        self.last_failover = Some(now_ms);
        self.failover_count += 1;
        true
    }

    /// Return traffic to the primary. Returns false if the primary is not
    /// available or already active.
    pub fn fail_back(&mut self) -> bool {
        if !self.primary.is_available() || self.primary.id == self.active_instance_id {
            return false;
        }
        self.active_instance_id = self.primary.id.clone();
        true
    }

    pub fn invariant_holds(&self) -> bool {
        self.active_instance_id == self.primary.id
            || self
                .secondary
                .as_ref()
                .is_some_and(|s| s.id == self.active_instance_id)
    }

    pub fn record_sync(&mut self, event: SyncEvent) {
        self.sync.record(event);
    }

    /// Hot pools with both ends healthy run replication passes.
    pub fn sync_eligible(&self) -> bool {
        self.mode.replicates()
            && self.primary.is_available()
            && self.secondary.as_ref().is_some_and(|s| s.is_available())
    }
}

/// Read-only view of a pool for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    pub name: String,
    pub mode: RedundancyMode,
    pub active_instance_id: String,
    pub active_role: InstanceRole,
    pub available: bool,
    pub instances: Vec<ServiceInstance>,
    pub failover_count: u64,
    pub last_failover: Option<u64>,
    pub average_sync_ms: Option<f64>,
    pub last_sync: Option<SyncEvent>,
}

impl From<&ConnectionPool> for PoolStatus {
    fn from(pool: &ConnectionPool) -> Self {
        let active = pool.active();
        Self {
            name: pool.name.clone(),
            mode: pool.mode,
            active_instance_id: active.id.clone(),
            active_role: active.role,
            available: active.is_available(),
            instances: pool.instances().cloned().collect(),
            failover_count: pool.failover_count,
            last_failover: pool.last_failover,
            average_sync_ms: pool.sync.average_duration_ms(),
            last_sync: pool.sync.last().cloned(),
        }
    }
}
