//! Rolling health snapshot history.
//!
//! Two bounded rings: a fine-grained ring sized for one hour of probe
//! cycles, and a coarse ring of folded entries. Every `fold_every` pushes,
//! the most recent `fold_every` fine snapshots are averaged into one coarse
//! entry.

use std::collections::VecDeque;

use serde::Serialize;

use crate::health::state::{HealthStatus, ServiceHealth};

/// Point-in-time aggregate over every monitored dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub timestamp: u64,
    pub overall: HealthStatus,
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub offline: usize,
    pub unknown: usize,
    pub average_latency_ms: Option<f64>,
}

impl HealthSnapshot {
    pub fn from_services<'a>(
        services: impl IntoIterator<Item = &'a ServiceHealth>,
        timestamp: u64,
    ) -> Self {
        let mut snapshot = HealthSnapshot {
            timestamp,
            overall: HealthStatus::Unknown,
            total: 0,
            healthy: 0,
            degraded: 0,
            unhealthy: 0,
            offline: 0,
            unknown: 0,
            average_latency_ms: None,
        };

        let mut latency_sum = 0.0;
        let mut latency_count = 0usize;
        for service in services {
            snapshot.total += 1;
            match service.status {
                HealthStatus::Healthy => snapshot.healthy += 1,
                HealthStatus::Degraded => snapshot.degraded += 1,
                HealthStatus::Unhealthy => snapshot.unhealthy += 1,
                HealthStatus::Offline => snapshot.offline += 1,
                HealthStatus::Unknown => snapshot.unknown += 1,
            }
            if let Some(latency) = service.latency_ms {
                latency_sum += latency;
                latency_count += 1;
            }
        }

        if latency_count > 0 {
            snapshot.average_latency_ms = Some(latency_sum / latency_count as f64);
        }
        snapshot.overall = snapshot.derive_overall();
        snapshot
    }

    fn derive_overall(&self) -> HealthStatus {
        let failing = self.unhealthy + self.offline;
        if self.total == 0 || self.unknown == self.total {
            HealthStatus::Unknown
        } else if self.healthy == self.total {
            HealthStatus::Healthy
        } else if failing == self.total {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        }
    }

    /// Fraction of dependencies that were healthy, 0 when nothing is registered.
    pub fn healthy_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.healthy as f64 / self.total as f64
        }
    }

    /// Average a run of snapshots into one coarse entry.
    fn fold(window: &[&HealthSnapshot]) -> Option<HealthSnapshot> {
        let last = window.last()?;
        let n = window.len() as f64;
        let avg = |f: fn(&HealthSnapshot) -> usize| -> usize {
            (window.iter().map(|s| f(*s) as f64).sum::<f64>() / n).round() as usize
        };

        let latencies: Vec<f64> = window.iter().filter_map(|s| s.average_latency_ms).collect();
        let mut folded = HealthSnapshot {
            timestamp: last.timestamp,
            overall: HealthStatus::Unknown,
            total: avg(|s| s.total),
            healthy: avg(|s| s.healthy),
            degraded: avg(|s| s.degraded),
            unhealthy: avg(|s| s.unhealthy),
            offline: avg(|s| s.offline),
            unknown: avg(|s| s.unknown),
            average_latency_ms: if latencies.is_empty() {
                None
            } else {
                Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
            },
        };
        folded.overall = folded.derive_overall();
        Some(folded)
    }
}

/// Fine and coarse snapshot rings.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    fine: VecDeque<HealthSnapshot>,
    hourly: VecDeque<HealthSnapshot>,
    fine_capacity: usize,
    hourly_capacity: usize,
    fold_every: usize,
    since_fold: usize,
}

impl SnapshotHistory {
    pub fn new(fine_capacity: usize, hourly_capacity: usize, fold_every: usize) -> Self {
        let fine_capacity = fine_capacity.max(1);
        Self {
            fine: VecDeque::with_capacity(fine_capacity),
            hourly: VecDeque::with_capacity(hourly_capacity),
            fine_capacity,
            hourly_capacity: hourly_capacity.max(1),
            fold_every: fold_every.max(1),
            since_fold: 0,
        }
    }

    pub fn push(&mut self, snapshot: HealthSnapshot) {
        if self.fine.len() == self.fine_capacity {
            self.fine.pop_front();
        }
        self.fine.push_back(snapshot);
        self.since_fold += 1;

        if self.since_fold >= self.fold_every {
            self.since_fold = 0;
            let window: Vec<&HealthSnapshot> =
                self.fine.iter().rev().take(self.fold_every).rev().collect();
            if let Some(folded) = HealthSnapshot::fold(&window) {
                if self.hourly.len() == self.hourly_capacity {
                    self.hourly.pop_front();
                }
                self.hourly.push_back(folded);
            }
        }
    }

    pub fn latest(&self) -> Option<&HealthSnapshot> {
        self.fine.back()
    }

    pub fn fine(&self) -> impl Iterator<Item = &HealthSnapshot> {
        self.fine.iter()
    }

    pub fn hourly(&self) -> impl Iterator<Item = &HealthSnapshot> {
        self.hourly.iter()
    }

    /// Snapshots covering the last `window_hours`.
    ///
    /// One hour or less reads the fine ring; longer windows read the last
    /// `window_hours` coarse entries.
    pub fn window(&self, window_hours: u32) -> Vec<HealthSnapshot> {
        if window_hours <= 1 {
            self.fine.iter().cloned().collect()
        } else {
            let skip = self.hourly.len().saturating_sub(window_hours as usize);
            self.hourly.iter().skip(skip).cloned().collect()
        }
    }
}

/// Per-dependency line in an uptime report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyUptime {
    pub name: String,
    pub status: HealthStatus,
    pub uptime_percent: f64,
    pub latency_ms: Option<f64>,
}

/// Availability over a time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UptimeReport {
    pub window_hours: u32,
    pub samples: usize,
    /// Mean share of healthy dependencies across the window's snapshots.
    pub availability_percent: f64,
    pub average_latency_ms: Option<f64>,
    pub dependencies: Vec<DependencyUptime>,
}

impl UptimeReport {
    pub fn build(window_hours: u32, snapshots: &[HealthSnapshot], services: &[ServiceHealth]) -> Self {
        let samples = snapshots.len();
        let availability_percent = if samples == 0 {
            0.0
        } else {
            snapshots.iter().map(|s| s.healthy_ratio()).sum::<f64>() / samples as f64 * 100.0
        };
        let latencies: Vec<f64> = snapshots.iter().filter_map(|s| s.average_latency_ms).collect();
        let average_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        let mut dependencies: Vec<DependencyUptime> = services
            .iter()
            .map(|s| DependencyUptime {
                name: s.name.clone(),
                status: s.status,
                uptime_percent: s.uptime_percent,
                latency_ms: s.latency_ms,
            })
            .collect();
        dependencies.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            window_hours,
            samples,
            availability_percent,
            average_latency_ms,
            dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::HealthThresholds;
    use std::time::Duration;

    fn snapshot(ts: u64, healthy: usize, total: usize) -> HealthSnapshot {
        HealthSnapshot {
            timestamp: ts,
            overall: HealthStatus::Unknown,
            total,
            healthy,
            degraded: total - healthy,
            unhealthy: 0,
            offline: 0,
            unknown: 0,
            average_latency_ms: Some(10.0),
        }
    }

    #[test]
    fn test_snapshot_counts() {
        let thresholds = HealthThresholds::default();
        let mut a = ServiceHealth::new("a", "a:1");
        a.record_success(Duration::from_millis(10), &thresholds, 1);
        let mut b = ServiceHealth::new("b", "b:1");
        b.record_success(Duration::from_millis(30), &thresholds, 1);
        let c = ServiceHealth::new("c", "c:1");

        let snap = HealthSnapshot::from_services([&a, &b, &c], 5);
        assert_eq!(snap.total, 3);
        assert_eq!(snap.healthy, 2);
        assert_eq!(snap.unknown, 1);
        assert_eq!(snap.average_latency_ms, Some(20.0));
        assert_eq!(snap.overall, HealthStatus::Degraded);
    }

    #[test]
    fn test_empty_snapshot_is_unknown() {
        let snap = HealthSnapshot::from_services(std::iter::empty(), 0);
        assert_eq!(snap.overall, HealthStatus::Unknown);
        assert_eq!(snap.healthy_ratio(), 0.0);
    }

    #[test]
    fn test_fine_ring_is_bounded() {
        let mut history = SnapshotHistory::new(3, 24, 60);
        for ts in 0..5 {
            history.push(snapshot(ts, 1, 1));
        }
        let kept: Vec<u64> = history.fine().map(|s| s.timestamp).collect();
        assert_eq!(kept, vec![2, 3, 4]);
        assert_eq!(history.hourly().count(), 0);
    }

    #[test]
    fn test_folds_every_nth_snapshot() {
        let mut history = SnapshotHistory::new(120, 2, 4);
        for ts in 0..4 {
            history.push(snapshot(ts, if ts < 2 { 2 } else { 0 }, 2));
        }
        let hourly: Vec<_> = history.hourly().cloned().collect();
        assert_eq!(hourly.len(), 1);
        assert_eq!(hourly[0].timestamp, 3);
        assert_eq!(hourly[0].healthy, 1);
        assert_eq!(hourly[0].total, 2);

        for ts in 4..12 {
            history.push(snapshot(ts, 2, 2));
        }
        // Capacity two: the first folded entry has been evicted.
        let stamps: Vec<u64> = history.hourly().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![7, 11]);
    }

    #[test]
    fn test_uptime_report_availability() {
        let snapshots = vec![snapshot(1, 2, 2), snapshot(2, 1, 2)];
        let report = UptimeReport::build(1, &snapshots, &[]);
        assert_eq!(report.samples, 2);
        assert!((report.availability_percent - 75.0).abs() < 1e-9);
        assert_eq!(report.average_latency_ms, Some(10.0));
    }
}
