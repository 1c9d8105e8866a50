//! Applies derived values through a [`RuntimeControl`] port.

use tracing::{debug, info};

use super::{MemoryCeiling, RuntimeControl};

/// Knob values captured before tuning touched them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSnapshot {
    pub parallelism: usize,
    pub memory_ceiling: MemoryCeiling,
}

/// Writes parallelism and memory ceiling, skipping writes that change nothing.
///
/// Every mutation is visible process-wide immediately, so apply both values
/// before accepting latency-sensitive work.
#[derive(Debug, Clone)]
pub struct Applier<R> {
    runtime: R,
}

impl<R: RuntimeControl> Applier<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Capture the current values.
    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            parallelism: self.runtime.parallelism(),
            memory_ceiling: self.runtime.memory_ceiling(),
        }
    }

    /// Set parallelism to `n` (at least 1). Returns the previous value.
    pub fn apply_parallelism(&self, n: usize) -> usize {
        let n = n.max(1);
        let current = self.runtime.parallelism();
        if current == n {
            debug!(parallelism = n, "parallelism already applied");
            return current;
        }

        let previous = self.runtime.set_parallelism(n);
        info!(parallelism = n, previous, "parallelism updated");
        previous
    }

    /// Set the soft memory ceiling to `bytes`. Returns the previous ceiling.
    pub fn apply_memory_ceiling(&self, bytes: u64) -> MemoryCeiling {
        let ceiling = MemoryCeiling::Bytes(bytes);
        let current = self.runtime.memory_ceiling();
        if current == ceiling {
            debug!(memory_ceiling = bytes, "memory ceiling already applied");
            return current;
        }

        let previous = self.runtime.set_memory_ceiling(ceiling);
        info!(memory_ceiling = bytes, previous = %previous, "memory ceiling updated");
        previous
    }

    /// Put back values captured by [`snapshot`](Self::snapshot).
    pub fn restore(&self, snapshot: &RuntimeSnapshot) {
        self.runtime.set_parallelism(snapshot.parallelism);
        self.runtime.set_memory_ceiling(snapshot.memory_ceiling);
    }
}
