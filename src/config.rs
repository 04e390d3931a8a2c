//! Engine configuration
//!
//! Loaded from YAML; every field has a default, so an empty file is valid:
//!
//! ```yaml
//! data_path: database/data.json
//! positions_path: database/positions.json
//! recalc_timeout_secs: 120
//! solver:
//!   layer_spacing: 150.0
//!   max_iterations: 500
//! policy:
//!   max_mentees: 3
//! ```

use crate::graph::RelationshipPolicy;
use crate::layout::SolverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// People and relationships data file
    pub data_path: PathBuf,
    /// Position file
    pub positions_path: PathBuf,
    /// Wall-clock bound for one recalculation
    pub recalc_timeout_secs: u64,
    pub solver: SolverConfig,
    pub policy: RelationshipPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("database/data.json"),
            positions_path: PathBuf::from("database/positions.json"),
            recalc_timeout_secs: 120,
            solver: SolverConfig::default(),
            policy: RelationshipPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.solver.validate().map_err(ConfigError::Invalid)?;
        if self.recalc_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "recalc_timeout_secs must be positive".to_string(),
            ));
        }
        if self.policy.max_mentees == 0 {
            return Err(ConfigError::Invalid(
                "policy.max_mentees must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn recalc_timeout(&self) -> Duration {
        Duration::from_secs(self.recalc_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.data_path, PathBuf::from("database/data.json"));
        assert_eq!(config.recalc_timeout(), Duration::from_secs(120));
        assert_eq!(config.solver.max_iterations, 500);
        assert_eq!(config.policy.max_mentees, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "positions_path: /tmp/pos.json\nsolver:\n  layer_origin: 2015\npolicy:\n  reject_reciprocal: false\n";
        let config = EngineConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.positions_path, PathBuf::from("/tmp/pos.json"));
        assert_eq!(config.solver.layer_origin, 2015);
        assert_eq!(config.solver.layer_spacing, 150.0);
        assert!(!config.policy.reject_reciprocal);
        assert_eq!(config.policy.max_mentees, 3);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            EngineConfig::from_yaml_str("recalc_timeout_secs: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("solver:\n  edge_attraction: 0.9"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("solver: [1, 2]"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
