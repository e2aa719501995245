//! Multi-region failover.
//!
//! # Data Flow
//! ```text
//! Heartbeat tick (engine.rs):
//!     Probe each region endpoint
//!     → record_heartbeat: count failures, Degraded / Offline
//!     → Primary at threshold: execute_failover to first Active/Standby region
//!
//! Sync tick (engine.rs):
//!     Replicator::replication_lag(primary, each standby)
//!     → SyncReport (InSync / Syncing / LagDetected / OutOfSync / SyncFailed)
//!     → failover_readiness score
//!
//! Cutover (engine.rs, own task):
//!     Both regions FailingOver
//!     → Database, Cache, MessageQueue, BackendApi, WebSocket, EtlPipeline, AiEngine
//!       (one timeline entry each, staggered by category weight)
//!     → Primary flag moves in one step, completion entry with RTO verdict
//! ```

pub mod engine;
pub mod types;

pub use engine::{classify_lag, MultiRegionEngine};
pub use types::{
    FailoverOutcome, ReadinessReport, Region, RegionHeartbeat, RegionStatus, ServiceCategory,
    ServiceState, SyncReport, SyncStatus, TimelineEntry, TimelineStep,
};
