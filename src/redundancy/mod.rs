//! Primary/secondary redundancy for logical dependencies.
//!
//! # Data Flow
//! ```text
//! Heartbeat tick (manager.rs):
//!     For each pool
//!     → Probe primary (reconnect with backoff if down)
//!     → Probe secondary (hot/active-active always, others when needed)
//!     → Refresh standbys
//!     → pool.rs: fail over / fail back if the active replica changed health
//!
//! Sync tick (manager.rs):
//!     For each hot pool with both ends healthy
//!     → Replicator::replicate
//!     → sync.rs: append SyncEvent, update smoothed duration
//! ```

pub mod instance;
pub mod manager;
pub mod pool;
pub mod sync;

pub use instance::{ConnectionState, InstanceRole, ServiceInstance};
pub use manager::RedundancyManager;
pub use pool::{ConnectionPool, PoolStatus, RedundancyMode};
pub use sync::SyncEvent;
