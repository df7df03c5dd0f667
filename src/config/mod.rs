use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Name used to identify the breaker in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of failures tolerated before the circuit opens (0 opens on the first failure)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: i64,

    /// How long the circuit stays open before a probe call is let through, in milliseconds
    #[serde(default = "default_half_open_timeout_ms")]
    pub half_open_timeout_ms: u64,

    /// Optional deadline for a single call, in milliseconds
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_failure_threshold() -> i64 {
    5
}

fn default_half_open_timeout_ms() -> u64 {
    60_000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            failure_threshold: default_failure_threshold(),
            half_open_timeout_ms: default_half_open_timeout_ms(),
            call_timeout_ms: None,
        }
    }
}

impl BreakerConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.failure_threshold)?;

        if self.call_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout(format!(
                "call timeout must be > 0 for breaker: {}",
                self.name
            )));
        }

        Ok(())
    }

    pub fn half_open_timeout(&self) -> Duration {
        Duration::from_millis(self.half_open_timeout_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Convert a signed threshold into a failure count, rejecting negatives
pub(crate) fn validate_threshold(threshold: i64) -> Result<usize> {
    usize::try_from(threshold).map_err(|_| ConfigError::InvalidThreshold(threshold))
}
