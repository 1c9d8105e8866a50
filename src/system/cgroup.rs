//! Cgroup v2 limit discovery.
//!
//! Reads `cpu.max` and `memory.max` of the control group the current process
//! belongs to. Every "unlimited" encoding is normalized into [`Limit::Unlimited`]
//! here, so nothing downstream ever does arithmetic on a sentinel.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::core::{Error, Result};

/// Mount point of the unified hierarchy.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Membership file of the current process.
pub const PROC_SELF_CGROUP: &str = "/proc/self/cgroup";

/// Kernel default for `cpu.max` period (100ms) when only the quota is present.
pub const DEFAULT_CPU_PERIOD: u64 = 100_000;

/// A resource limit that may be unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit<T> {
    /// No limit enforced ("max", -1, or the maximum representable value).
    Unlimited,
    /// An enforced, finite limit.
    Bounded(T),
}

impl<T: Copy> Limit<T> {
    /// The bounded value, if any.
    pub fn bounded(&self) -> Option<T> {
        match self {
            Limit::Unlimited => None,
            Limit::Bounded(v) => Some(*v),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }
}

impl<T: fmt::Display> fmt::Display for Limit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Unlimited => write!(f, "max"),
            Limit::Bounded(v) => write!(f, "{}", v),
        }
    }
}

/// CPU bandwidth limit from `cpu.max`.
///
/// cgroups v2 uses `cpu.max` with format: "{quota} {period}"
/// - period: Time slice in microseconds (usually 100000 = 100ms)
/// - quota: How many microseconds the cgroup can use per period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuLimit {
    /// Microseconds of CPU time per period. `Bounded` always holds a positive value.
    pub quota: Limit<i64>,
    /// Period in microseconds. Non-zero whenever `quota` is bounded.
    pub period: u64,
}

impl CpuLimit {
    /// Parse the contents of a `cpu.max` file.
    ///
    /// Both `max` and negative quotas (some orchestrators write `-1`) mean unlimited.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut parts = content.split_whitespace();

        let quota = match parts.next() {
            Some("max") => Limit::Unlimited,
            Some(raw) => {
                let value: i64 = raw
                    .parse()
                    .map_err(|e| format!("invalid quota '{}': {}", raw, e))?;
                if value < 0 {
                    Limit::Unlimited
                } else if value == 0 {
                    return Err("quota cannot be zero".to_string());
                } else {
                    Limit::Bounded(value)
                }
            }
            None => return Err("empty cpu.max".to_string()),
        };

        let period = match parts.next() {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| format!("invalid period '{}': {}", raw, e))?,
            None => DEFAULT_CPU_PERIOD,
        };

        if period == 0 && !quota.is_unlimited() {
            return Err("period cannot be zero".to_string());
        }

        Ok(Self { quota, period })
    }
}

/// Memory limit from `memory.max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimit {
    /// Hard memory maximum in bytes.
    pub max: Limit<u64>,
}

impl MemoryLimit {
    /// Parse the contents of a `memory.max` file.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let trimmed = content.trim();
        let max = match trimmed {
            "max" => Limit::Unlimited,
            "" => return Err("empty memory.max".to_string()),
            raw => match raw.parse::<u64>() {
                Ok(u64::MAX) => Limit::Unlimited,
                Ok(value) => Limit::Bounded(value),
                Err(e) => return Err(format!("invalid value '{}': {}", raw, e)),
            },
        };
        Ok(Self { max })
    }
}

/// Reads limits of the current process's control group.
#[derive(Debug, Clone)]
pub struct CgroupReader {
    root: PathBuf,
    proc_cgroup: PathBuf,
}

impl Default for CgroupReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CgroupReader {
    /// Reader for the host's real hierarchy.
    pub fn new() -> Self {
        Self::with_paths(CGROUP_ROOT, PROC_SELF_CGROUP)
    }

    /// Reader rooted at arbitrary paths (used by tests and chroots).
    pub fn with_paths(root: impl Into<PathBuf>, proc_cgroup: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            proc_cgroup: proc_cgroup.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the unified hierarchy is mounted at the root.
    pub fn is_unified(&self) -> bool {
        self.root.join("cgroup.controllers").exists()
    }

    /// Resolve the directory of the current process's control group.
    ///
    /// Uses the `0::<path>` entry of `/proc/self/cgroup`. When that path does
    /// not exist under the root (a private cgroup namespace mounts the
    /// process's own group at the root), the root itself is used.
    pub fn group_path(&self) -> Result<PathBuf> {
        if !self.is_unified() {
            return Err(Error::resource(
                self.root.display().to_string(),
                "unified cgroup hierarchy not mounted",
            ));
        }

        let content = fs::read_to_string(&self.proc_cgroup)
            .map_err(|e| Error::resource(self.proc_cgroup.display().to_string(), e))?;

        let relative = unified_entry(&content).ok_or_else(|| {
            Error::resource(
                self.proc_cgroup.display().to_string(),
                "no unified hierarchy entry",
            )
        })?;

        let path = self.root.join(relative.trim_start_matches('/'));
        if path.is_dir() {
            trace!("cgroup path: {}", path.display());
            Ok(path)
        } else {
            debug!(
                "cgroup {} not visible under {}, using root",
                relative,
                self.root.display()
            );
            Ok(self.root.clone())
        }
    }

    /// Read `cpu.max` of the given group.
    pub fn read_cpu_limit(&self, group: &Path) -> Result<CpuLimit> {
        let file = group.join("cpu.max");
        let content = read_limit_file(&file)?;
        let limit = CpuLimit::parse(&content).map_err(|e| Error::resource(file_name(&file), e))?;
        debug!(quota = %limit.quota, period = limit.period, "cgroup cpu.max");
        Ok(limit)
    }

    /// Read `memory.max` of the given group.
    pub fn read_memory_limit(&self, group: &Path) -> Result<MemoryLimit> {
        let file = group.join("memory.max");
        let content = read_limit_file(&file)?;
        let limit =
            MemoryLimit::parse(&content).map_err(|e| Error::resource(file_name(&file), e))?;
        debug!(max = %limit.max, "cgroup memory.max");
        Ok(limit)
    }
}

/// Extract the path of the `0::` line (unified hierarchy) from `/proc/<pid>/cgroup`.
fn unified_entry(content: &str) -> Option<&str> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("0::"))
        .map(str::trim)
        .filter(|path| !path.is_empty())
}

fn read_limit_file(file: &Path) -> Result<String> {
    fs::read_to_string(file).map_err(|e| Error::resource(file_name(file), e))
}

fn file_name(file: &Path) -> String {
    file.display().to_string()
}
