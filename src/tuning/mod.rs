//! Derivation of tuning values from discovered limits.
//!
//! - [`cpu`] - parallelism from the cgroup quota, else the ECS allotment
//! - [`memory`] - soft memory ceiling as a fraction of `memory.max`

pub mod cpu;
pub mod memory;

use std::fmt;

pub use cpu::{
    parallelism_from_quota, parallelism_from_units, CgroupQuota, CpuDecision, CpuDeriver,
    CpuSource, CpuStrategy, EcsMetadata,
};
pub use memory::derive_memory_ceiling;

use crate::runtime::MemoryCeiling;

/// Outcome of a single resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The strategy produced a value; later strategies are not consulted.
    Found(T),
    /// The strategy has nothing to say; try the next one.
    NotApplicable,
}

/// A value written to the runtime, together with what it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied<T, P = T> {
    pub value: T,
    pub previous: P,
}

/// What one discovery pass changed. `None` means the dimension was left alone
/// (disabled, unlimited, or skipped after a recoverable error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TuningReport {
    pub parallelism: Option<(Applied<usize>, CpuSource)>,
    pub memory_ceiling: Option<Applied<u64, MemoryCeiling>>,
}

impl fmt::Display for TuningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parallelism {
            Some((applied, source)) => write!(f, "parallelism={} ({})", applied.value, source)?,
            None => write!(f, "parallelism=unchanged")?,
        }
        match &self.memory_ceiling {
            Some(applied) => write!(f, ", memory_ceiling={}", applied.value),
            None => write!(f, ", memory_ceiling=unchanged"),
        }
    }
}
