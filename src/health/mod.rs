//! Dependency health monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Probe cycle (monitor.rs):
//!     Periodic timer
//!     → Probe each dependency concurrently, each under a deadline
//!     → Update state.rs
//!     → Publish status changes on the event bus
//!     → Push an aggregate snapshot into history.rs
//!
//! State machine (state.rs):
//!     Unknown → Healthy/Degraded/Unhealthy/Offline
//!     One success recovers, consecutive failures escalate
//!
//! History (history.rs):
//!     Fine ring (one hour of cycles) → folded hourly ring → uptime reports
//! ```

pub mod history;
pub mod monitor;
pub mod state;

pub use history::{HealthSnapshot, UptimeReport};
pub use monitor::HealthMonitor;
pub use state::{HealthStatus, HealthThresholds, ServiceHealth};
