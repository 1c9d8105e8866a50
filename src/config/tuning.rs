//! Tuning configuration.

use std::time::Duration;

use super::parse::{env_bool, env_duration, env_parse};
use super::ConfigError;

/// Default fraction of the cgroup memory maximum used as the soft ceiling.
pub const DEFAULT_MEMORY_RATIO: f64 = 0.9;

/// Default timeout for each ECS metadata request.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// What to tune and how, loaded from environment.
///
/// Immutable once [`validate`](Self::validate) has accepted it.
#[derive(Clone, Debug, PartialEq)]
pub struct TuningConfig {
    /// Derive and apply the parallelism count.
    pub cpu_enabled: bool,
    /// Derive and apply the soft memory ceiling.
    pub memory_enabled: bool,
    /// Fraction of the memory maximum used as the ceiling, in (0, 1].
    pub memory_ratio: f64,
    /// Upper bound for each metadata HTTP call.
    pub metadata_timeout: Duration,
    /// Re-run discovery on this interval after startup (None = one-shot).
    pub reevaluate_interval: Option<Duration>,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            cpu_enabled: true,
            memory_enabled: true,
            memory_ratio: DEFAULT_MEMORY_RATIO,
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            reevaluate_interval: None,
        }
    }
}

impl TuningConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let metadata_timeout = env_duration("CGROUP_RUNTIME_METADATA_TIMEOUT", "5s")?
            .ok_or_else(|| ConfigError::Invalid {
                key: "CGROUP_RUNTIME_METADATA_TIMEOUT".into(),
                message: "metadata timeout cannot be disabled".into(),
            })?;

        Ok(Self {
            cpu_enabled: env_bool("CGROUP_RUNTIME_CPU", true),
            memory_enabled: env_bool("CGROUP_RUNTIME_MEMORY", true),
            memory_ratio: env_parse("CGROUP_RUNTIME_MEMORY_RATIO", DEFAULT_MEMORY_RATIO)?,
            metadata_timeout,
            reevaluate_interval: env_duration("CGROUP_RUNTIME_REEVALUATE", "off")?,
        })
    }

    /// Check invariants. The ratio only matters when memory tuning is on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_enabled && !(self.memory_ratio > 0.0 && self.memory_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                key: "CGROUP_RUNTIME_MEMORY_RATIO".into(),
                message: format!("{} is outside (0, 1]", self.memory_ratio),
            });
        }
        Ok(())
    }
}
