// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime configuration for a [`PlayerLoop`](crate::PlayerLoop).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a [`RuntimeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to access the runtime configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid JSON for [`RuntimeConfig`].
    #[error("failed to parse the runtime configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field holds a value the runtime cannot use.
    #[error("invalid runtime configuration: {0}")]
    Invalid(String),
}

/// Tunables of the scheduler.
///
/// Every field has a default, so a configuration file only needs to list the
/// fields it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Initial slot count of every phase's continuation queue.
    pub initial_queue_capacity: usize,
    /// Queue length beyond which growth is logged as a warning.
    /// The queue keeps accepting work past this length.
    pub max_queue_length: usize,
    /// Cap on idle nodes kept by each promise pool.
    pub max_pool_size: usize,
    /// Whether canceled outcomes nobody read are reported as unobserved.
    pub propagate_cancellation: bool,
    /// Multiplier applied to the frame delta to obtain scaled time.
    pub time_scale: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            initial_queue_capacity: 16,
            max_queue_length: 1 << 20,
            max_pool_size: cadence_core::pool::DEFAULT_MAX_POOL_SIZE,
            propagate_cancellation: false,
            time_scale: 1.0,
        }
    }
}

impl RuntimeConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Writes the configuration to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "initial_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_queue_length < self.initial_queue_capacity {
            return Err(ConfigError::Invalid(format!(
                "max_queue_length ({}) is smaller than initial_queue_capacity ({})",
                self.max_queue_length, self.initial_queue_capacity
            )));
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_scale must be a finite, non-negative number, got {}",
                self.time_scale
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "time_scale": 0.5 }"#).unwrap();
        assert_eq!(config.time_scale, 0.5);
        assert_eq!(config.initial_queue_capacity, 16);
        assert!(!config.propagate_cancellation);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let error = RuntimeConfig::from_json(r#"{ "initial_queue_capacity": 0 }"#).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));

        let error = RuntimeConfig::from_json(r#"{ "time_scale": -1.0 }"#).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let error = RuntimeConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!("cadence-config-{}.json", std::process::id()));
        let config = RuntimeConfig {
            max_pool_size: 8,
            ..RuntimeConfig::default()
        };
        config.to_file(&path).unwrap();
        let loaded = RuntimeConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
