//! Tracker configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::EngageError;

/// Longest quiet period accepted; beyond this milestones lag visibly
pub const MAX_QUIET_PERIOD_MS: u64 = 10_000;

/// Runtime configuration for the engagement trackers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngageConfig {
    /// Coalescing window for scroll and resize samples, in milliseconds
    pub quiet_period_ms: u64,
    /// Start a new scroll-depth scope when only the query string changes
    pub reset_on_query_change: bool,
    /// Evaluate reading progress as soon as a region mounts
    pub evaluate_on_mount: bool,
    /// Producer instance id stamped on envelopes. Random when unset.
    pub instance_id: Option<String>,
}

impl Default for EngageConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 100,
            reset_on_query_change: false,
            evaluate_on_mount: true,
            instance_id: None,
        }
    }
}

impl EngageConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngageError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngageError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngageError::ConfigError(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<(), EngageError> {
        if self.quiet_period_ms > MAX_QUIET_PERIOD_MS {
            return Err(EngageError::ConfigError(format!(
                "quiet_period_ms must be at most {MAX_QUIET_PERIOD_MS}, got {}",
                self.quiet_period_ms
            )));
        }
        if let Some(id) = &self.instance_id {
            if id.trim().is_empty() {
                return Err(EngageError::ConfigError("instance_id must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}
