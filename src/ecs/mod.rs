//! AWS ECS task metadata lookup.
//!
//! On ECS the cgroup `cpu.max` may read `max` while the task still has a
//! share-based CPU entitlement. The metadata endpoint advertised through
//! `ECS_CONTAINER_METADATA_URI_V4` is the only place that entitlement shows up.
//!
//! ```text
//! GET ${ECS_CONTAINER_METADATA_URI_V4}        → { "DockerId", "Limits": { "CPU": 512 } }
//! GET ${ECS_CONTAINER_METADATA_URI_V4}/task   → { "Limits": { "CPU": .. },
//!                                                 "Containers": [ { "DockerId", "Limits" } ] }
//! ```

mod client;
mod types;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::env_opt;
use crate::core::Result;

pub use client::EcsMetadataClient;
pub use types::{ContainerMetadata, Limits, TaskMetadata};

/// Environment variable carrying the metadata discovery URI.
pub const ECS_METADATA_ENV: &str = "ECS_CONTAINER_METADATA_URI_V4";

/// ECS CPU units that make up one logical CPU.
pub const ECS_UNITS_PER_CPU: f64 = 1024.0;

/// Discovery URI from the environment. None means "not running on ECS".
pub fn discovery_uri() -> Option<String> {
    env_opt(ECS_METADATA_ENV)
}

/// CPU entitlement reported by ECS, in CPU units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EcsAllotment {
    /// Units reported for this container (0 = none reported).
    pub container_units: f64,
    /// Units reported at task scope (0 = none reported or not queried).
    pub task_units: f64,
}

/// Scope an allotment was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllotmentScope {
    Container,
    Task,
}

impl EcsAllotment {
    /// Effective units: the container value, falling back to the task value.
    ///
    /// Returns None when neither scope reports a positive limit.
    pub fn units(&self) -> Option<(f64, AllotmentScope)> {
        if self.container_units > 0.0 {
            Some((self.container_units, AllotmentScope::Container))
        } else if self.task_units > 0.0 {
            Some((self.task_units, AllotmentScope::Task))
        } else {
            None
        }
    }
}

/// Anything that can report the ECS CPU allotment of this container.
///
/// Implemented by [`EcsMetadataClient`]; tests substitute canned values.
#[async_trait]
pub trait AllotmentSource: Send + Sync {
    async fn allotment(&self, cancel: &CancellationToken) -> Result<EcsAllotment>;
}
