//! Dependency health state machine.
//!
//! # States
//! - Unknown: registered, never probed
//! - Healthy: last probe succeeded within the latency ceiling
//! - Degraded: last probe succeeded slowly, or failed fewer than `unhealthy` times in a row
//! - Unhealthy: at least `unhealthy` consecutive failures
//! - Offline: at least `offline` consecutive failures
//!
//! # State Transitions
//! ```text
//! any → Healthy/Degraded: one successful probe (failure counter resets)
//! any → Degraded:         failure, consecutive failures < unhealthy
//! any → Unhealthy:        consecutive failures >= unhealthy
//! Unhealthy → Offline:    consecutive failures >= offline
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::as_millis_f64;
use crate::config::HealthMonitorConfig;
use crate::error::ContinuityError;

/// Health classification of a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Offline => "offline",
            HealthStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Thresholds applied to every probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    pub unhealthy: u32,
    pub offline: u32,
    pub latency_ceiling: Duration,
}

impl HealthThresholds {
    pub fn from_config(config: &HealthMonitorConfig) -> Self {
        Self {
            unhealthy: config.unhealthy_threshold,
            offline: config.offline_threshold,
            latency_ceiling: Duration::from_millis(config.latency_threshold_ms),
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::from_config(&HealthMonitorConfig::default())
    }
}

/// Health record of one monitored dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub target: String,
    pub status: HealthStatus,
    /// Latency of the last successful probe.
    pub latency_ms: Option<f64>,
    pub last_check: Option<u64>,
    pub last_success: Option<u64>,
    pub last_failure: Option<u64>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_checks: u64,
    pub successful_checks: u64,
    /// Share of successful probes since registration, in percent.
    pub uptime_percent: f64,
}

impl ServiceHealth {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            status: HealthStatus::Unknown,
            latency_ms: None,
            last_check: None,
            last_success: None,
            last_failure: None,
            last_error: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_checks: 0,
            successful_checks: 0,
            uptime_percent: 100.0,
        }
    }

    /// Apply a successful probe. Returns the new status.
    pub fn record_success(
        &mut self,
        latency: Duration,
        thresholds: &HealthThresholds,
        now_ms: u64,
    ) -> HealthStatus {
        self.consecutive_failures = 0;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.total_checks += 1;
        self.successful_checks += 1;
        self.latency_ms = Some(as_millis_f64(latency));
        self.last_check = Some(now_ms);
        self.last_success = Some(now_ms);
        self.last_error = None;

        self.status = if latency > thresholds.latency_ceiling {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        self.refresh_uptime();
        self.status
    }

    /// Apply a failed or timed-out probe. Returns the new status.
    pub fn record_failure(
        &mut self,
        error: &ContinuityError,
        thresholds: &HealthThresholds,
        now_ms: u64,
    ) -> HealthStatus {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
        self.total_checks += 1;
        self.last_check = Some(now_ms);
        self.last_failure = Some(now_ms);
        self.last_error = Some(error.to_string());

        self.status = if self.consecutive_failures >= thresholds.offline {
            HealthStatus::Offline
        } else if self.consecutive_failures >= thresholds.unhealthy {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };
        self.refresh_uptime();
        self.status
    }

    fn refresh_uptime(&mut self) {
        if self.total_checks > 0 {
            self.uptime_percent = self.successful_checks as f64 / self.total_checks as f64 * 100.0;
        }
    }
}
