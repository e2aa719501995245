//! Control-plane event subscription.
//!
//! Every manager publishes onto one shared [`EventBus`]; alerting code holds
//! receivers. Publishing never blocks and never fails: with no subscribers
//! the event is dropped, and a subscriber that falls behind loses the oldest
//! events (`RecvError::Lagged`).

use serde::Serialize;
use tokio::sync::broadcast;

use crate::availability::NodeStatus;
use crate::health::HealthStatus;
use crate::redundancy::ConnectionState;
use crate::region::{RegionStatus, ServiceCategory};

/// A state change worth telling the outside world about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    DependencyStatusChanged {
        name: String,
        from: HealthStatus,
        to: HealthStatus,
    },
    InstanceStateChanged {
        pool: String,
        instance: String,
        state: ConnectionState,
        healthy: bool,
    },
    PoolFailover {
        pool: String,
        from_instance: String,
        to_instance: String,
        manual: bool,
    },
    PoolFailback {
        pool: String,
        instance: String,
        manual: bool,
    },
    SyncDegraded {
        scope: String,
        detail: String,
    },
    NodeStatusChanged {
        service: String,
        node: String,
        from: NodeStatus,
        to: NodeStatus,
    },
    NodeFailover {
        service: String,
        from_node: String,
        to_node: Option<String>,
        reason: String,
        success: bool,
    },
    RegionStatusChanged {
        region: String,
        from: RegionStatus,
        to: RegionStatus,
    },
    RegionFailoverStarted {
        from: String,
        to: String,
        manual: bool,
    },
    RegionCategorySwitched {
        from: String,
        to: String,
        category: ServiceCategory,
    },
    RegionFailoverCompleted {
        from: String,
        to: String,
        duration_ms: u64,
        rto_met: bool,
    },
}

/// Broadcast hub shared by all managers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ControlEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ControlEvent) {
        tracing::trace!(?event, "Publishing control event");
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
