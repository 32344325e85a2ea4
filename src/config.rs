//! Engine Configuration
//!
//! One YAML document covers the cache, task pacing and edge sampling. Every
//! section and field is optional; missing values take their defaults.
//!
//! ```yaml
//! cache:
//!   memory_budget_bytes: 104857600
//!   max_entry_age: 300        # seconds
//! task:
//!   batch_size: 50
//!   cached_batch_delay: 50    # milliseconds
//!   computed_batch_delay: 10
//!   cancel_wait: 5000
//! sampling:
//!   sampling_density: 80.0
//!   min_length: 0.01
//!   lines_only: false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adapters::SamplingParams;
use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::task::TaskOptions;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub task: TaskOptions,
    pub sampling: SamplingParams,
}

impl EngineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.memory_budget_bytes == 0 {
            return Err(Error::Config(
                "cache.memory_budget_bytes must be greater than 0".to_string(),
            ));
        }
        if self.task.batch_size == 0 {
            return Err(Error::Config(
                "task.batch_size must be greater than 0".to_string(),
            ));
        }
        if !(self.sampling.sampling_density.is_finite() && self.sampling.sampling_density > 0.0) {
            return Err(Error::Config(
                "sampling.sampling_density must be a positive number".to_string(),
            ));
        }
        if !(self.sampling.min_length.is_finite() && self.sampling.min_length >= 0.0) {
            return Err(Error::Config(
                "sampling.min_length must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}
