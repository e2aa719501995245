//! One replica endpoint inside a connection pool.
//!
//! # Connection States
//! ```text
//! Disconnected → Connecting → Connected
//!                          ↘ Failed        (reconnect attempts exhausted)
//! Connected → Reconnecting → Connected | Failed
//! any → Disconnected                        (disconnect_all)
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::as_millis_f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceRole {
    Primary,
    Secondary,
    Standby,
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstanceRole::Primary => "primary",
            InstanceRole::Secondary => "secondary",
            InstanceRole::Standby => "standby",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceInstance {
    /// `{pool}-{role}` for primary and secondary, `{pool}-standby-{n}` for standbys.
    pub id: String,
    pub role: InstanceRole,
    pub endpoint: String,
    pub state: ConnectionState,
    pub healthy: bool,
    pub connection_attempts: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub latency_ms: Option<f64>,
    pub last_check: Option<u64>,
    pub last_error: Option<String>,
}

impl ServiceInstance {
    pub fn new(id: impl Into<String>, role: InstanceRole, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            endpoint: endpoint.into(),
            state: ConnectionState::Disconnected,
            healthy: false,
            connection_attempts: 0,
            successful_checks: 0,
            failed_checks: 0,
            latency_ms: None,
            last_check: None,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Usable as a failover or failback target.
    pub fn is_available(&self) -> bool {
        self.healthy && self.is_connected()
    }

    pub fn mark_success(&mut self, latency: Duration, now_ms: u64) {
        self.healthy = true;
        self.successful_checks += 1;
        self.latency_ms = Some(as_millis_f64(latency));
        self.last_check = Some(now_ms);
        self.last_error = None;
    }

    pub fn mark_failure(&mut self, error: impl fmt::Display, now_ms: u64) {
        self.healthy = false;
        self.failed_checks += 1;
        self.last_check = Some(now_ms);
        self.last_error = Some(error.to_string());
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.healthy = false;
    }
}
