//! Liveness and replication capabilities supplied by the host.
//!
//! # Data Flow
//! ```text
//! HealthMonitor / RedundancyManager / MultiRegionEngine
//!     → resilience::timeouts::probe_with_timeout
//!     → Probe::probe(target)          (tcp.rs, http.rs, or a test fake)
//!     → Ok(latency) | Err(ProbeFailure)
//!
//! RedundancyManager sync loop   → Replicator::replicate(primary, secondary)
//! MultiRegionEngine sync check  → Replicator::replication_lag(source, target)
//! ```
//!
//! # Design Decisions
//! - The core never speaks a protocol itself; targets are opaque strings
//! - Deadlines are applied by the caller, not the probe
//! - Implementations must be cheap to share (`Arc<dyn Probe>`)

pub mod http;
pub mod replication;
pub mod tcp;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ContinuityResult;

pub use http::HttpProbe;
pub use replication::ReportedReplicator;
pub use tcp::TcpProbe;

/// A liveness check against a single target.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Check `target` once, returning the observed latency on success.
    async fn probe(&self, target: &str) -> ContinuityResult<Duration>;
}

/// Replication position between two endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationLag {
    /// How far the target trails the source.
    pub lag: Duration,
    /// Records already applied on the target.
    pub records_synced: u64,
    /// Records written on the source but not yet applied.
    pub records_pending: u64,
}

/// Replication between a primary and its replica.
#[async_trait]
pub trait Replicator: Send + Sync + 'static {
    /// Run one replication pass, returning the number of bytes moved.
    async fn replicate(&self, primary: &str, secondary: &str) -> ContinuityResult<u64>;

    /// Measure how far `target` trails `source`.
    async fn replication_lag(&self, source: &str, target: &str) -> ContinuityResult<ReplicationLag>;
}
