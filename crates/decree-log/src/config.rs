//! # config
//!
//! why: size the mutation window and toggle event logging per replica
//! relations: consumed by prepare_list.rs and replica.rs
//! what: LogConfig, defaults, JSON loading, validation

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default number of prepared-but-uncommitted mutations a replica buffers
pub const DEFAULT_MAX_PREPARE_COUNT: usize = 1024;

/// Configuration for one partition's replicated log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct LogConfig {
    /// Capacity of the mutation window
    #[builder(default = DEFAULT_MAX_PREPARE_COUNT)]
    pub max_prepare_count: usize,
    /// Emit prepare/commit events through the `log` facade
    #[builder(default = true)]
    pub log_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_prepare_count: DEFAULT_MAX_PREPARE_COUNT,
            log_events: true,
        }
    }
}

impl LogConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: LogConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_prepare_count == 0 {
            return Err(ConfigError::Invalid(
                "max_prepare_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
