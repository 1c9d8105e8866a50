//! System resource limit detection.
//!
//! Reads the CPU and memory limits the kernel enforces on the current
//! process through the unified cgroup (v2) hierarchy. cgroup v1 hosts are
//! reported as [`ResourceUnavailable`](crate::core::Error::ResourceUnavailable).
//!
//! # Example
//!
//! ```rust,ignore
//! use cgroup_runtime::system::CgroupReader;
//!
//! let reader = CgroupReader::new();
//! let group = reader.group_path()?;
//! let cpu = reader.read_cpu_limit(&group)?;
//! println!("quota: {}, period: {}", cpu.quota, cpu.period);
//! ```

mod cgroup;

pub use cgroup::{
    CgroupReader, CpuLimit, Limit, MemoryLimit, CGROUP_ROOT, DEFAULT_CPU_PERIOD, PROC_SELF_CGROUP,
};
