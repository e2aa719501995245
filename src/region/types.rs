//! Region registry records, heartbeats, sync reports and the cutover timeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::now_millis;
use crate::config::schema::RegionDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionStatus {
    Active,
    Standby,
    Syncing,
    FailingOver,
    Offline,
    Degraded,
    Maintenance,
}

impl RegionStatus {
    /// Can take over from a failing primary.
    pub fn can_take_over(&self) -> bool {
        matches!(self, RegionStatus::Active | RegionStatus::Standby)
    }
}

impl fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegionStatus::Active => "active",
            RegionStatus::Standby => "standby",
            RegionStatus::Syncing => "syncing",
            RegionStatus::FailingOver => "failing_over",
            RegionStatus::Offline => "offline",
            RegionStatus::Degraded => "degraded",
            RegionStatus::Maintenance => "maintenance",
        })
    }
}

/// Service families cut over between regions, in cutover order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Database,
    Cache,
    MessageQueue,
    BackendApi,
    WebSocket,
    EtlPipeline,
    AiEngine,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 7] = [
        ServiceCategory::Database,
        ServiceCategory::Cache,
        ServiceCategory::MessageQueue,
        ServiceCategory::BackendApi,
        ServiceCategory::WebSocket,
        ServiceCategory::EtlPipeline,
        ServiceCategory::AiEngine,
    ];

    /// Relative cutover cost, in steps.
    pub fn weight(&self) -> u64 {
        match self {
            ServiceCategory::Database => 3,
            ServiceCategory::MessageQueue | ServiceCategory::EtlPipeline => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceCategory::Database => "database",
            ServiceCategory::Cache => "cache",
            ServiceCategory::MessageQueue => "message_queue",
            ServiceCategory::BackendApi => "backend_api",
            ServiceCategory::WebSocket => "web_socket",
            ServiceCategory::EtlPipeline => "etl_pipeline",
            ServiceCategory::AiEngine => "ai_engine",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Healthy,
    Degraded,
    Down,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub availability_zones: Vec<String>,
    pub status: RegionStatus,
    pub is_primary: bool,
    pub capacity: f64,
    pub current_load: f64,
    pub last_heartbeat: Option<u64>,
    pub heartbeat_failures: u32,
    pub services: BTreeMap<ServiceCategory, ServiceState>,
}

impl Region {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>, is_primary: bool) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            endpoint: endpoint.into(),
            availability_zones: Vec::new(),
            status: if is_primary {
                RegionStatus::Active
            } else {
                RegionStatus::Standby
            },
            is_primary,
            capacity: 100.0,
            current_load: 0.0,
            last_heartbeat: None,
            heartbeat_failures: 0,
            services: ServiceCategory::ALL
                .iter()
                .map(|c| (*c, ServiceState::Unknown))
                .collect(),
        }
    }

    /// Status a healthy region settles back into.
    pub fn resting_status(&self) -> RegionStatus {
        if self.is_primary {
            RegionStatus::Active
        } else {
            RegionStatus::Standby
        }
    }

    pub fn mark_all_services(&mut self, state: ServiceState) {
        for value in self.services.values_mut() {
            *value = state;
        }
    }
}

impl From<&RegionDefinition> for Region {
    fn from(def: &RegionDefinition) -> Self {
        let mut region = Region::new(&def.id, &def.endpoint, def.primary);
        if let Some(name) = &def.name {
            region.name = name.clone();
        }
        region.availability_zones = def.availability_zones.clone();
        region.capacity = def.capacity;
        region
    }
}

/// One periodic sample from a region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionHeartbeat {
    pub region_id: String,
    pub timestamp: u64,
    pub latency_ms: Option<f64>,
    pub healthy_services: usize,
    pub total_services: usize,
    pub sync_lag_ms: Option<u64>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub success: bool,
    pub error: Option<String>,
}

impl RegionHeartbeat {
    pub fn success(region_id: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            region_id: region_id.into(),
            timestamp: now_millis(),
            latency_ms: Some(latency_ms),
            healthy_services: 0,
            total_services: 0,
            sync_lag_ms: None,
            cpu_usage: None,
            memory_usage: None,
            success: true,
            error: None,
        }
    }

    pub fn failure(region_id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            region_id: region_id.into(),
            timestamp: now_millis(),
            latency_ms: None,
            healthy_services: 0,
            total_services: 0,
            sync_lag_ms: None,
            cpu_usage: None,
            memory_usage: None,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InSync,
    Syncing,
    LagDetected,
    OutOfSync,
    SyncFailed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::InSync => "in_sync",
            SyncStatus::Syncing => "syncing",
            SyncStatus::LagDetected => "lag_detected",
            SyncStatus::OutOfSync => "out_of_sync",
            SyncStatus::SyncFailed => "sync_failed",
        })
    }
}

/// Replication comparison between two regions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub source: String,
    pub target: String,
    pub timestamp: u64,
    /// Zero when the measurement itself failed.
    pub lag_ms: u64,
    pub records_synced: u64,
    pub records_pending: u64,
    pub status: SyncStatus,
    /// Lag within the recovery-point objective.
    pub rpo_met: bool,
    pub error: Option<String>,
}

/// What happened at one point of a cutover.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineStep {
    /// One service category moved; `offset_ms` is cumulative from the start.
    CategorySwitched {
        category: ServiceCategory,
        offset_ms: u64,
    },
    Completed {
        duration_ms: u64,
        rto_met: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub id: Uuid,
    pub timestamp: u64,
    pub from_region: String,
    pub to_region: String,
    pub manual: bool,
    pub step: TimelineStep,
}

impl TimelineEntry {
    pub fn involves(&self, region: &str) -> bool {
        self.from_region == region || self.to_region == region
    }

    pub fn is_completion(&self) -> bool {
        matches!(self.step, TimelineStep::Completed { .. })
    }
}

/// Result of a finished cutover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailoverOutcome {
    pub from: String,
    pub to: String,
    pub manual: bool,
    pub duration_ms: u64,
    pub rto_met: bool,
    pub categories: Vec<ServiceCategory>,
}

/// Composite estimate of whether a failover would currently succeed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessReport {
    /// In [0, 1].
    pub score: f64,
    pub ready: bool,
    pub primary: Option<String>,
    pub healthy_standbys: usize,
    pub latest_sync: Option<SyncStatus>,
    pub heartbeat_age_secs: Option<u64>,
    pub issues: Vec<String>,
}
