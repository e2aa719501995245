//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ContinuityConfig (validated, immutable)
//!     → each manager receives its own section by value
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AvailabilityConfig;
pub use schema::ContinuityConfig;
pub use schema::HealthMonitorConfig;
pub use schema::ObservabilityConfig;
pub use schema::RedundancyConfig;
pub use schema::RegionConfig;
