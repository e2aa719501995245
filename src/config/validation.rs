//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, thresholds ordered)
//! - Detect duplicate names and conflicting primaries
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ContinuityConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::schema::ContinuityConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &ContinuityConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_health(config, &mut errors);
    validate_redundancy(config, &mut errors);
    validate_availability(config, &mut errors);
    validate_regions(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn non_zero(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than zero"));
    }
}

fn percentage(errors: &mut Vec<ValidationError>, field: &str, value: f64) {
    if !(value > 0.0 && value <= 100.0) {
        errors.push(ValidationError::new(field, "must be within (0, 100]"));
    }
}

fn unique<'a>(
    errors: &mut Vec<ValidationError>,
    field: &str,
    names: impl Iterator<Item = &'a str>,
) {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            errors.push(ValidationError::new(field, format!("duplicate entry '{}'", name)));
        }
    }
}

fn validate_health(config: &ContinuityConfig, errors: &mut Vec<ValidationError>) {
    let health = &config.health;
    non_zero(errors, "health.interval_secs", health.interval_secs);
    non_zero(errors, "health.probe_timeout_ms", health.probe_timeout_ms);
    non_zero(errors, "health.unhealthy_threshold", health.unhealthy_threshold as u64);
    non_zero(errors, "health.fold_every", health.fold_every as u64);
    non_zero(errors, "health.hourly_capacity", health.hourly_capacity as u64);
    if health.fold_every > health.fine_capacity() {
        errors.push(ValidationError::new(
            "health.fold_every",
            format!(
                "must not exceed the {} snapshots retained per hour at this interval",
                health.fine_capacity()
            ),
        ));
    }
    if health.offline_threshold <= health.unhealthy_threshold {
        errors.push(ValidationError::new(
            "health.offline_threshold",
            "must be greater than health.unhealthy_threshold",
        ));
    }
    unique(
        errors,
        "health.dependencies",
        health.dependencies.iter().map(|d| d.name.as_str()),
    );
}

fn validate_redundancy(config: &ContinuityConfig, errors: &mut Vec<ValidationError>) {
    let redundancy = &config.redundancy;
    non_zero(errors, "redundancy.heartbeat_interval_secs", redundancy.heartbeat_interval_secs);
    non_zero(errors, "redundancy.sync_interval_secs", redundancy.sync_interval_secs);
    non_zero(errors, "redundancy.probe_timeout_ms", redundancy.probe_timeout_ms);
    non_zero(
        errors,
        "redundancy.max_reconnect_attempts",
        redundancy.max_reconnect_attempts as u64,
    );
    if redundancy.reconnect_base_delay_ms > redundancy.reconnect_max_delay_ms {
        errors.push(ValidationError::new(
            "redundancy.reconnect_base_delay_ms",
            "must not exceed redundancy.reconnect_max_delay_ms",
        ));
    }
    unique(
        errors,
        "redundancy.pools",
        redundancy.pools.iter().map(|p| p.name.as_str()),
    );
    for pool in &redundancy.pools {
        if pool.mode.requires_secondary() && pool.secondary.is_none() {
            errors.push(ValidationError::new(
                format!("redundancy.pools.{}.secondary", pool.name),
                format!("mode {:?} requires a secondary endpoint", pool.mode),
            ));
        }
    }
}

fn validate_availability(config: &ContinuityConfig, errors: &mut Vec<ValidationError>) {
    let availability = &config.availability;
    non_zero(errors, "availability.check_interval_secs", availability.check_interval_secs);
    non_zero(errors, "availability.failure_threshold", availability.failure_threshold as u64);
    percentage(errors, "availability.cpu_threshold", availability.cpu_threshold);
    percentage(errors, "availability.memory_threshold", availability.memory_threshold);
    if availability.latency_threshold_ms <= 0.0 {
        errors.push(ValidationError::new(
            "availability.latency_threshold_ms",
            "must be greater than zero",
        ));
    }
    if !(availability.connection_capacity_ratio > 0.0 && availability.connection_capacity_ratio <= 1.0) {
        errors.push(ValidationError::new(
            "availability.connection_capacity_ratio",
            "must be within (0, 1]",
        ));
    }

    let mut ids: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut primaries: HashMap<&str, usize> = HashMap::new();
    for node in &availability.nodes {
        if !ids.entry(node.service.as_str()).or_default().insert(node.id.as_str()) {
            errors.push(ValidationError::new(
                format!("availability.nodes.{}", node.service),
                format!("duplicate node id '{}'", node.id),
            ));
        }
        if node.primary {
            *primaries.entry(node.service.as_str()).or_default() += 1;
        }
    }
    for (service, count) in primaries {
        if count > 1 {
            errors.push(ValidationError::new(
                format!("availability.nodes.{}", service),
                format!("{} nodes marked primary, at most one allowed", count),
            ));
        }
    }
}

fn validate_regions(config: &ContinuityConfig, errors: &mut Vec<ValidationError>) {
    let regions = &config.regions;
    non_zero(errors, "regions.heartbeat_interval_secs", regions.heartbeat_interval_secs);
    non_zero(
        errors,
        "regions.heartbeat_failure_threshold",
        regions.heartbeat_failure_threshold as u64,
    );
    non_zero(errors, "regions.probe_timeout_ms", regions.probe_timeout_ms);
    non_zero(errors, "regions.sync_check_interval_secs", regions.sync_check_interval_secs);
    non_zero(errors, "regions.max_sync_lag_ms", regions.max_sync_lag_ms);
    non_zero(errors, "regions.rto_secs", regions.rto_secs);
    non_zero(errors, "regions.history_capacity", regions.history_capacity as u64);
    if !(0.0..=1.0).contains(&regions.readiness_threshold) {
        errors.push(ValidationError::new(
            "regions.readiness_threshold",
            "must be within [0, 1]",
        ));
    }
    unique(
        errors,
        "regions.regions",
        regions.regions.iter().map(|r| r.id.as_str()),
    );
    let primaries = regions.regions.iter().filter(|r| r.primary).count();
    if primaries > 1 {
        errors.push(ValidationError::new(
            "regions.regions",
            format!("{} regions marked primary, at most one allowed", primaries),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{NodeConfig, PoolConfig, RegionDefinition};
    use crate::redundancy::RedundancyMode;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ContinuityConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ContinuityConfig::default();
        config.health.interval_secs = 0;
        config.health.offline_threshold = 2;
        config.availability.cpu_threshold = 150.0;
        config.redundancy.pools.push(PoolConfig {
            name: "db".into(),
            mode: RedundancyMode::HotStandby,
            primary: "db-a:5432".into(),
            secondary: None,
            standbys: Vec::new(),
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"health.interval_secs"));
        assert!(fields.contains(&"health.offline_threshold"));
        assert!(fields.contains(&"availability.cpu_threshold"));
        assert!(fields.contains(&"redundancy.pools.db.secondary"));
    }

    #[test]
    fn test_fold_window_fits_fine_ring() {
        let mut config = ContinuityConfig::default();
        // 600s interval retains 6 snapshots; folding 60 would average a partial window.
        config.health.interval_secs = 600;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "health.fold_every");

        config.health.fold_every = 6;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_duplicate_primaries() {
        let mut config = ContinuityConfig::default();
        for id in ["a", "b"] {
            config.availability.nodes.push(NodeConfig {
                id: id.into(),
                service: "api".into(),
                host: "127.0.0.1".into(),
                port: 80,
                weight: 1,
                max_connections: 10,
                primary: true,
            });
            config.regions.regions.push(RegionDefinition {
                id: id.into(),
                name: None,
                endpoint: format!("{}.example:443", id),
                availability_zones: Vec::new(),
                primary: true,
                capacity: 100.0,
            });
        }

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "availability.nodes.api"));
        assert!(errors.iter().any(|e| e.field == "regions.regions"));
    }
}
