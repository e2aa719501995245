//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe of an external target:
//!     → timeouts.rs (enforce per-probe deadline)
//!     → On failure while reconnecting: backoff.rs (exponential delay + jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every probe has a deadline
//! - A timeout is reported like any other probe failure
//! - Jittered backoff prevents reconnect storms against a recovering primary

pub mod backoff;
pub mod timeouts;

pub use backoff::BackoffPolicy;
pub use timeouts::probe_with_timeout;
