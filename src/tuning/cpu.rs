//! Parallelism derivation.
//!
//! Strategies are consulted in order and the first [`Resolution::Found`] wins:
//!
//! 1. [`CgroupQuota`] - a finite `cpu.max` quota is enforced by the kernel,
//!    so it is the most trustworthy signal.
//! 2. [`EcsMetadata`] - when the quota is `max` on ECS, the container (else
//!    task) CPU units are the only record of the entitlement.
//!
//! If nothing is found the runtime's parallelism is left untouched.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::Resolution;
use crate::core::Result;
use crate::ecs::{AllotmentScope, AllotmentSource, ECS_UNITS_PER_CPU};
use crate::system::{CpuLimit, Limit};

/// Where a parallelism value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuSource {
    CgroupQuota,
    EcsContainer,
    EcsTask,
}

impl fmt::Display for CpuSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CgroupQuota => write!(f, "cgroup quota"),
            Self::EcsContainer => write!(f, "ecs container"),
            Self::EcsTask => write!(f, "ecs task"),
        }
    }
}

/// A derived parallelism count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuDecision {
    pub parallelism: usize,
    pub source: CpuSource,
}

/// `max(1, floor(quota / period))`.
///
/// # Example
///
/// - quota 100000, period 8000 → 12
/// - quota 50000, period 100000 → 1
pub fn parallelism_from_quota(quota: i64, period: u64) -> usize {
    if quota <= 0 || period == 0 {
        return 1;
    }
    ((quota as u64 / period) as usize).max(1)
}

/// `max(1, floor(units / 1024))`.
pub fn parallelism_from_units(units: f64) -> usize {
    ((units / ECS_UNITS_PER_CPU).floor() as usize).max(1)
}

/// One step of the fallback chain.
#[async_trait]
pub trait CpuStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, cancel: &CancellationToken) -> Result<Resolution<CpuDecision>>;
}

/// Finite `cpu.max` quota.
#[derive(Debug, Clone, Copy)]
pub struct CgroupQuota {
    limit: CpuLimit,
}

impl CgroupQuota {
    pub fn new(limit: CpuLimit) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl CpuStrategy for CgroupQuota {
    fn name(&self) -> &'static str {
        "cgroup-quota"
    }

    async fn resolve(&self, _cancel: &CancellationToken) -> Result<Resolution<CpuDecision>> {
        Ok(match self.limit.quota {
            Limit::Bounded(quota) => Resolution::Found(CpuDecision {
                parallelism: parallelism_from_quota(quota, self.limit.period),
                source: CpuSource::CgroupQuota,
            }),
            Limit::Unlimited => Resolution::NotApplicable,
        })
    }
}

/// ECS container/task CPU units.
pub struct EcsMetadata<'a> {
    source: &'a dyn AllotmentSource,
}

impl<'a> EcsMetadata<'a> {
    pub fn new(source: &'a dyn AllotmentSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<'a> CpuStrategy for EcsMetadata<'a> {
    fn name(&self) -> &'static str {
        "ecs-metadata"
    }

    async fn resolve(&self, cancel: &CancellationToken) -> Result<Resolution<CpuDecision>> {
        let allotment = self.source.allotment(cancel).await?;

        Ok(match allotment.units() {
            Some((units, scope)) => Resolution::Found(CpuDecision {
                parallelism: parallelism_from_units(units),
                source: match scope {
                    AllotmentScope::Container => CpuSource::EcsContainer,
                    AllotmentScope::Task => CpuSource::EcsTask,
                },
            }),
            None => Resolution::NotApplicable,
        })
    }
}

/// Ordered chain of [`CpuStrategy`]s.
pub struct CpuDeriver<'a> {
    strategies: Vec<Box<dyn CpuStrategy + 'a>>,
}

impl<'a> CpuDeriver<'a> {
    /// Standard chain: cgroup quota, then ECS metadata if a source is given.
    pub fn new(limit: CpuLimit, metadata: Option<&'a dyn AllotmentSource>) -> Self {
        let mut strategies: Vec<Box<dyn CpuStrategy + 'a>> = Vec::with_capacity(2);
        strategies.push(Box::new(CgroupQuota::new(limit)));
        if let Some(source) = metadata {
            strategies.push(Box::new(EcsMetadata::new(source)));
        }
        Self { strategies }
    }

    /// Custom chain, consulted in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn CpuStrategy + 'a>>) -> Self {
        Self { strategies }
    }

    /// Run the chain. `Ok(None)` means "leave parallelism unchanged".
    ///
    /// A strategy error ends the chain: later strategies are broader
    /// fallbacks and must not paper over a source that failed.
    pub async fn derive(&self, cancel: &CancellationToken) -> Result<Option<CpuDecision>> {
        for strategy in &self.strategies {
            match strategy.resolve(cancel).await? {
                Resolution::Found(decision) => {
                    debug!(
                        strategy = strategy.name(),
                        parallelism = decision.parallelism,
                        "parallelism derived"
                    );
                    return Ok(Some(decision));
                }
                Resolution::NotApplicable => {
                    trace!(strategy = strategy.name(), "not applicable");
                }
            }
        }
        Ok(None)
    }
}
