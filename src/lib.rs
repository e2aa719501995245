//! Operational continuity control plane.
//!
//! Four cooperating managers keep a deployment serving through failures:
//! dependency health monitoring, primary/secondary connection pools,
//! load-balanced node groups with promotion, and multi-region cutover.

// Managers
pub mod availability;
pub mod health;
pub mod redundancy;
pub mod region;

// Shared plumbing
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod load_balancer;
pub mod probe;
pub mod resilience;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use availability::HighAvailabilityManager;
pub use config::ContinuityConfig;
pub use error::{ContinuityError, ContinuityResult};
pub use events::{ControlEvent, EventBus};
pub use health::HealthMonitor;
pub use lifecycle::{ControlPlane, Shutdown};
pub use redundancy::RedundancyManager;
pub use region::MultiRegionEngine;
