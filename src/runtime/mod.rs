//! Process-wide runtime knobs.
//!
//! Two values are shared by everything in the process:
//!
//! - **parallelism**: how many worker threads CPU-bound pools should run
//! - **memory ceiling**: soft byte budget memory-hungry components stay under
//!
//! They are plain atomics. Readers call [`parallelism()`] / [`memory_ceiling()`]
//! whenever they size something; there is one writer at a time (the tuning
//! pass holds a lock), so no further synchronization is needed.
//!
//! Writers go through the [`RuntimeControl`] port so tuning can be exercised
//! against an in-memory fake instead of the real globals.

mod applier;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub use applier::{Applier, RuntimeSnapshot};

/// 0 = never set, report the detected CPU count instead.
static PARALLELISM: AtomicUsize = AtomicUsize::new(0);

/// u64::MAX = no ceiling.
static MEMORY_CEILING: AtomicU64 = AtomicU64::new(u64::MAX);

/// Soft memory ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryCeiling {
    /// No soft limit (the default).
    #[default]
    NoLimit,
    /// Stay under this many bytes.
    Bytes(u64),
}

impl MemoryCeiling {
    fn from_raw(raw: u64) -> Self {
        if raw == u64::MAX {
            MemoryCeiling::NoLimit
        } else {
            MemoryCeiling::Bytes(raw)
        }
    }

    fn into_raw(self) -> u64 {
        match self {
            MemoryCeiling::NoLimit => u64::MAX,
            MemoryCeiling::Bytes(bytes) => bytes,
        }
    }

    /// Byte value, if a ceiling is set.
    pub fn bytes(&self) -> Option<u64> {
        match self {
            MemoryCeiling::NoLimit => None,
            MemoryCeiling::Bytes(bytes) => Some(*bytes),
        }
    }
}

impl fmt::Display for MemoryCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryCeiling::NoLimit => write!(f, "no limit"),
            MemoryCeiling::Bytes(bytes) => write!(f, "{} bytes", bytes),
        }
    }
}

/// Current parallelism: the applied value, or the logical CPU count.
pub fn parallelism() -> usize {
    match PARALLELISM.load(Ordering::Acquire) {
        0 => num_cpus::get(),
        n => n,
    }
}

/// Current soft memory ceiling.
pub fn memory_ceiling() -> MemoryCeiling {
    MemoryCeiling::from_raw(MEMORY_CEILING.load(Ordering::Acquire))
}

/// Read/write port onto the parallelism and memory ceiling knobs.
///
/// Setters return the value that was in effect before the call.
pub trait RuntimeControl: Send + Sync {
    fn parallelism(&self) -> usize;

    fn set_parallelism(&self, n: usize) -> usize;

    fn memory_ceiling(&self) -> MemoryCeiling;

    fn set_memory_ceiling(&self, ceiling: MemoryCeiling) -> MemoryCeiling;
}

/// The real, process-global knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRuntime;

impl RuntimeControl for ProcessRuntime {
    fn parallelism(&self) -> usize {
        parallelism()
    }

    fn set_parallelism(&self, n: usize) -> usize {
        match PARALLELISM.swap(n.max(1), Ordering::AcqRel) {
            0 => num_cpus::get(),
            previous => previous,
        }
    }

    fn memory_ceiling(&self) -> MemoryCeiling {
        memory_ceiling()
    }

    fn set_memory_ceiling(&self, ceiling: MemoryCeiling) -> MemoryCeiling {
        MemoryCeiling::from_raw(MEMORY_CEILING.swap(ceiling.into_raw(), Ordering::AcqRel))
    }
}

impl<R: RuntimeControl + ?Sized> RuntimeControl for std::sync::Arc<R> {
    fn parallelism(&self) -> usize {
        (**self).parallelism()
    }

    fn set_parallelism(&self, n: usize) -> usize {
        (**self).set_parallelism(n)
    }

    fn memory_ceiling(&self) -> MemoryCeiling {
        (**self).memory_ceiling()
    }

    fn set_memory_ceiling(&self, ceiling: MemoryCeiling) -> MemoryCeiling {
        (**self).set_memory_ceiling(ceiling)
    }
}
