//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → build managers → register pools, nodes, regions
//!     → connect pools → spawn manager loops
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → caller begins stop
//!
//! Shutdown (shutdown.rs):
//!     trigger → every loop exits after its current tick
//!     → pool connections closed
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then managers, then loops
//! - Cutovers already in flight run to completion on their own task

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
pub use startup::ControlPlane;
