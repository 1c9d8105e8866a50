//! Configuration module for cgroup_runtime.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use cgroup_runtime::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Memory ratio: {}", config.tuning.memory_ratio);
//! ```

mod error;
mod logging;
mod parse;
mod tuning;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{env_opt, parse_duration};
pub use tuning::{TuningConfig, DEFAULT_MEMORY_RATIO, DEFAULT_METADATA_TIMEOUT};

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// What to tune.
    pub tuning: TuningConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            tuning: TuningConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!(
            "  CPU tuning: {}",
            if self.tuning.cpu_enabled { "enabled" } else { "disabled" }
        );

        if self.tuning.memory_enabled {
            info!("  Memory tuning: enabled (ratio {})", self.tuning.memory_ratio);
        } else {
            info!("  Memory tuning: disabled");
        }

        info!("  Metadata timeout: {:?}", self.tuning.metadata_timeout);

        match self.tuning.reevaluate_interval {
            Some(interval) => info!("  Re-evaluate every: {:?}", interval),
            None => info!("  Re-evaluate: off"),
        }

        if let Some(uri) = crate::ecs::discovery_uri() {
            info!("  ECS metadata: {}", uri);
        }
    }
}
