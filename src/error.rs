//! Error taxonomy shared by every manager.
//!
//! Probe, heartbeat and sync failures are folded into entity state by the
//! periodic loops and only surface here when a caller asks directly. The one
//! error a well-behaved caller can hit on a synchronous call is
//! [`ContinuityError::UnknownEntity`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The kind of registry entry an operation referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Dependency,
    Pool,
    Instance,
    Service,
    Node,
    Region,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Dependency => "dependency",
            EntityKind::Pool => "pool",
            EntityKind::Instance => "instance",
            EntityKind::Service => "service",
            EntityKind::Node => "node",
            EntityKind::Region => "region",
        };
        f.write_str(name)
    }
}

/// Errors produced by the control plane.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContinuityError {
    /// A probe did not answer within its deadline.
    #[error("probe of {target} timed out after {timeout_ms} ms")]
    ProbeTimeout { target: String, timeout_ms: u64 },

    /// A probe answered, negatively.
    #[error("probe of {target} failed: {reason}")]
    ProbeFailure { target: String, reason: String },

    /// Every reconnect attempt for an instance failed.
    #[error("instance {instance} still unreachable after {attempts} reconnect attempts")]
    ReconnectExhausted { instance: String, attempts: u32 },

    /// No healthy party is available to take over.
    #[error("no healthy standby available for {0}")]
    NoHealthyStandby(String),

    /// Replication between two parties is failing or too far behind.
    #[error("replication from {from} to {to} degraded: {detail}")]
    SyncDegraded {
        from: String,
        to: String,
        detail: String,
    },

    /// The operation referenced something that was never registered.
    #[error("unknown {kind}: {id}")]
    UnknownEntity { kind: EntityKind, id: String },

    /// A cutover is already running.
    #[error("failover already in progress for {0}")]
    FailoverInProgress(String),

    /// The cutover task stopped before completing (runtime shutdown).
    #[error("cutover from {from} to {to} aborted before completion")]
    FailoverAborted { from: String, to: String },
}

impl ContinuityError {
    pub fn unknown(kind: EntityKind, id: impl Into<String>) -> Self {
        ContinuityError::UnknownEntity {
            kind,
            id: id.into(),
        }
    }

    pub fn probe_failure(target: impl Into<String>, reason: impl fmt::Display) -> Self {
        ContinuityError::ProbeFailure {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the probe-level failures that loops absorb into state.
    pub fn is_probe_error(&self) -> bool {
        matches!(
            self,
            ContinuityError::ProbeTimeout { .. } | ContinuityError::ProbeFailure { .. }
        )
    }
}

/// Result type for control-plane operations.
pub type ContinuityResult<T> = Result<T, ContinuityError>;
