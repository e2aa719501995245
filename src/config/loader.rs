//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ContinuityConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Why a configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ContinuityConfig, ConfigError> {
    let config: ContinuityConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ContinuityConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [regions]
            rto_secs = 120

            [[regions.regions]]
            id = "us-east-1"
            endpoint = "east.example:443"
            primary = true

            [[regions.regions]]
            id = "eu-west-1"
            endpoint = "west.example:443"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.regions.rto_secs, 120);
        assert_eq!(config.regions.regions.len(), 2);
        assert!(config.regions.regions[0].primary);
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let err = parse_config("[health]\ninterval_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("health.interval_secs"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/continuity.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
