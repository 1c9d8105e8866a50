//! Lifecycle of the cgroup runtime component.
//!
//! ```text
//! Created ──validate──▶ Validated ──start──▶ Started ──shutdown──▶ Stopped
//!                                              │  ▲
//!                                              └──┘ reevaluate / periodic pass
//! ```
//!
//! Each pass reads the cgroup limits, consults ECS metadata when the CPU
//! quota is unlimited, and applies whatever could be derived. CPU and memory
//! are tuned independently: a failure in one is logged and never blocks the
//! other, and never fails startup.

mod factory;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TuningConfig;
use crate::core::{Error, Result};
use crate::ecs::{self, AllotmentSource, EcsMetadataClient};
use crate::runtime::{Applier, MemoryCeiling, ProcessRuntime, RuntimeControl};
use crate::system::CgroupReader;
use crate::tuning::{derive_memory_ceiling, Applied, CpuDeriver, CpuSource, TuningReport};

pub use factory::{Factory, COMPONENT_TYPE};

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Validated,
    Started,
    Stopped,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Created => "created",
            State::Validated => "validated",
            State::Started => "started",
            State::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discovers resource limits and applies them to the runtime.
pub struct CgroupRuntime<R: RuntimeControl + 'static = ProcessRuntime> {
    inner: Arc<Inner<R>>,
    state: Mutex<State>,
    reevaluation: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<R> {
    config: TuningConfig,
    reader: CgroupReader,
    metadata: Mutex<Option<EcsMetadataClient>>,
    applier: Applier<R>,
    /// Cancelled on shutdown. A pass never applies anything once it fires.
    shutdown: CancellationToken,
    /// Held for the whole pass: at most one pass mutates the runtime at a time.
    pass: tokio::sync::Mutex<()>,
}

impl CgroupRuntime<ProcessRuntime> {
    /// Component for the real host: `/sys/fs/cgroup`, the ECS discovery URI
    /// from the environment, and the process-global runtime knobs.
    pub fn new(config: TuningConfig) -> Self {
        Self::with_parts(
            config,
            CgroupReader::new(),
            ecs::discovery_uri(),
            ProcessRuntime,
        )
    }
}

impl<R: RuntimeControl + 'static> CgroupRuntime<R> {
    /// Component with every collaborator supplied by the caller.
    ///
    /// `metadata_uri` of None disables the ECS fallback.
    pub fn with_parts(
        config: TuningConfig,
        reader: CgroupReader,
        metadata_uri: Option<String>,
        runtime: R,
    ) -> Self {
        let metadata = metadata_uri.and_then(|uri| {
            match EcsMetadataClient::new(uri, config.metadata_timeout) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "ECS metadata fallback disabled");
                    None
                }
            }
        });

        Self {
            inner: Arc::new(Inner {
                config,
                reader,
                metadata: Mutex::new(metadata),
                applier: Applier::new(runtime),
                shutdown: CancellationToken::new(),
                pass: tokio::sync::Mutex::new(()),
            }),
            state: Mutex::new(State::Created),
            reevaluation: Mutex::new(None),
        }
    }

    pub fn state(&self) -> State {
        *self.state.lock().unwrap()
    }

    pub fn config(&self) -> &TuningConfig {
        &self.inner.config
    }

    /// Applier over the runtime port (snapshot/restore in tests).
    pub fn applier(&self) -> &Applier<R> {
        &self.inner.applier
    }

    /// Check the configuration. `InvalidConfig` keeps the component in `Created`.
    pub fn validate(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Created => {
                self.inner.config.validate()?;
                *state = State::Validated;
                Ok(())
            }
            State::Validated | State::Started => Ok(()),
            State::Stopped => Err(Error::InvalidState {
                operation: "validate",
                state: State::Stopped.as_str(),
            }),
        }
    }

    /// Validate if needed, then run the first discovery pass.
    ///
    /// Only `InvalidConfig` (and calling start twice) is an error; failures
    /// to read limits are logged and leave the affected knob untouched.
    /// Cancelling `cancel`, or shutting down, aborts any in-flight metadata
    /// request.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<TuningReport> {
        self.validate()?;
        {
            let mut state = self.state.lock().unwrap();
            if *state != State::Validated {
                return Err(Error::InvalidState {
                    operation: "start",
                    state: state.as_str(),
                });
            }
            *state = State::Started;
        }

        let linked = self.inner.shutdown.child_token();
        let pass = self.inner.run_pass(&linked);
        tokio::pin!(pass);

        let report = loop {
            tokio::select! {
                biased;
                report = &mut pass => break report,
                _ = cancel.cancelled(), if !linked.is_cancelled() => linked.cancel(),
            }
        };
        info!(%report, "cgroup runtime started");
        Ok(report)
    }

    /// Run another pass on demand. Only valid while started.
    pub async fn reevaluate(&self) -> Result<TuningReport> {
        let state = self.state();
        if state != State::Started {
            return Err(Error::InvalidState {
                operation: "reevaluate",
                state: state.as_str(),
            });
        }
        Ok(self.inner.run_pass(&self.inner.shutdown).await)
    }

    /// Spawn periodic re-evaluation on the current Tokio runtime.
    ///
    /// Returns false when no interval is configured, the component is not
    /// started, or the task is already running.
    pub fn spawn_reevaluation(&self) -> bool {
        let Some(interval) = self.inner.config.reevaluate_interval else {
            return false;
        };
        if self.state() != State::Started {
            return false;
        }

        let mut slot = self.reevaluation.lock().unwrap();
        if slot.is_some() {
            return false;
        }

        let inner = Arc::clone(&self.inner);
        let shutdown = self.inner.shutdown.clone();
        *slot = Some(tokio::spawn(reevaluate_loop(inner, interval, shutdown)));
        debug!(?interval, "periodic re-evaluation scheduled");
        true
    }

    /// Stop re-evaluation and abort in-flight metadata requests.
    ///
    /// Only valid while started; a second call is a no-op. Once this returns
    /// no pass touches the runtime again. Applied values stay in place.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                State::Started => *state = State::Stopped,
                State::Stopped => return Ok(()),
                other => {
                    return Err(Error::InvalidState {
                        operation: "shutdown",
                        state: other.as_str(),
                    })
                }
            }
        }
        self.inner.shutdown.cancel();

        let handle = self.reevaluation.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        // A pass still running has seen the cancellation; wait it out
        let _pass = self.inner.pass.lock().await;

        // Drops the connection pool
        self.inner.metadata.lock().unwrap().take();
        debug!("cgroup runtime stopped");
        Ok(())
    }
}

async fn reevaluate_loop<R: RuntimeControl + 'static>(
    inner: Arc<Inner<R>>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; start() already ran a pass
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let report = inner.run_pass(&shutdown).await;
                debug!(%report, "resource limits re-evaluated");
            }
        }
    }
}

impl<R: RuntimeControl> Inner<R> {
    async fn run_pass(&self, cancel: &CancellationToken) -> TuningReport {
        let _pass = self.pass.lock().await;
        let mut report = TuningReport::default();

        if self.shutdown.is_cancelled() {
            debug!("shutting down, pass skipped");
            return report;
        }

        if !self.config.cpu_enabled && !self.config.memory_enabled {
            debug!("CPU and memory tuning disabled");
            return report;
        }

        let group = match self.reader.group_path() {
            Ok(group) => group,
            Err(e) => {
                warn!(error = %e, "cgroup limits unavailable, runtime left at defaults");
                return report;
            }
        };

        if self.config.cpu_enabled {
            match self.tune_cpu(&group, cancel).await {
                Ok(applied) => report.parallelism = applied,
                Err(e) => warn!(error = %e, "CPU tuning skipped"),
            }
        }

        if self.config.memory_enabled {
            match self.tune_memory(&group) {
                Ok(applied) => report.memory_ceiling = applied,
                Err(e) => warn!(error = %e, "memory tuning skipped"),
            }
        }

        report
    }

    async fn tune_cpu(
        &self,
        group: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<(Applied<usize>, CpuSource)>> {
        let limit = self.reader.read_cpu_limit(group)?;
        let metadata = self.metadata.lock().unwrap().clone();
        let source = metadata.as_ref().map(|c| c as &dyn AllotmentSource);

        let Some(decision) = CpuDeriver::new(limit, source).derive(cancel).await? else {
            info!(quota = %limit.quota, "no CPU limit found, parallelism unchanged");
            return Ok(None);
        };

        if self.shutdown.is_cancelled() {
            debug!("shutting down, parallelism not applied");
            return Ok(None);
        }
        let previous = self.applier.apply_parallelism(decision.parallelism);
        Ok(Some((
            Applied {
                value: decision.parallelism,
                previous,
            },
            decision.source,
        )))
    }

    fn tune_memory(&self, group: &Path) -> Result<Option<Applied<u64, MemoryCeiling>>> {
        let limit = self.reader.read_memory_limit(group)?;

        let Some(ceiling) = derive_memory_ceiling(&limit, self.config.memory_ratio) else {
            info!("memory.max unlimited, memory ceiling unchanged");
            return Ok(None);
        };

        if self.shutdown.is_cancelled() {
            debug!("shutting down, memory ceiling not applied");
            return Ok(None);
        }
        let previous = self.applier.apply_memory_ceiling(ceiling);
        Ok(Some(Applied {
            value: ceiling,
            previous,
        }))
    }
}
