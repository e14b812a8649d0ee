//! Simulator configuration file

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use vsim_collector::CollectorConfig;
use vsim_inventory::ModelConfig;
use vsim_tasks::TaskConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Everything the simulator can be tuned with. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub tasks: TaskConfig,

    #[serde(default)]
    pub collector: CollectorConfig,
}

impl SimConfig {
    /// Load from `path`; a missing file means defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.tasks.delay_jitter) {
            return Err(ConfigError::Invalid {
                field: "tasks.delay_jitter".to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }
        if self.collector.max_object_updates == 0 {
            return Err(ConfigError::Invalid {
                field: "collector.max_object_updates".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = SimConfig::from_yaml(
            r#"
model:
  folders: 3
tasks:
  lock_handoff: false
  method_delay:
    PowerOnVM_Task: 25
"#,
        )
        .unwrap();

        assert_eq!(config.model.folders, 3);
        assert_eq!(config.model.vms_per_folder, 2);
        assert!(!config.tasks.lock_handoff);
        assert_eq!(config.tasks.method_delay["PowerOnVM_Task"], 25);
        assert_eq!(config.collector, CollectorConfig::default());
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let config = SimConfig::load("/nonexistent/vsim.yml").unwrap();
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = SimConfig::from_yaml("tasks:\n  delay_jitter: 2.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = SimConfig::from_yaml("collector: [1, 2]\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
