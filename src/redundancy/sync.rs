//! Replication pass records for a pool.

use std::collections::VecDeque;

use serde::Serialize;
use uuid::Uuid;

/// Weight of the newest pass in the smoothed sync duration.
const SMOOTHING: f64 = 0.1;

/// One replication pass between a pool's primary and secondary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncEvent {
    pub id: Uuid,
    pub pool: String,
    pub started_at: u64,
    pub duration_ms: f64,
    pub bytes: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// Bounded ring of sync events plus the smoothed pass duration.
#[derive(Debug, Clone)]
pub struct SyncLedger {
    events: VecDeque<SyncEvent>,
    capacity: usize,
    average_duration_ms: Option<f64>,
}

impl SyncLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            average_duration_ms: None,
        }
    }

    pub fn record(&mut self, event: SyncEvent) {
        if event.success {
            self.average_duration_ms = Some(match self.average_duration_ms {
                None => event.duration_ms,
                Some(avg) => SMOOTHING * event.duration_ms + (1.0 - SMOOTHING) * avg,
            });
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn average_duration_ms(&self) -> Option<f64> {
        self.average_duration_ms
    }

    pub fn last(&self) -> Option<&SyncEvent> {
        self.events.back()
    }

    pub fn events(&self) -> impl Iterator<Item = &SyncEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
