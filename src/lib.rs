//! cgroup_runtime - Fit a process's runtime to its container's resource limits.
//!
//! On startup the component reads the cgroup v2 limits of the current process
//! and derives two runtime knobs from them:
//!
//! - **Parallelism**: `floor(quota / period)` from `cpu.max`, or, when the
//!   quota is unlimited on Amazon ECS, `floor(units / 1024)` from the task
//!   metadata endpoint
//! - **Memory ceiling**: a configurable fraction of `memory.max`
//!
//! Anything that cannot be determined is left at its default; only an
//! invalid configuration prevents startup.
//!
//! # Example
//!
//! ```rust,ignore
//! use cgroup_runtime::extension::Factory;
//! use tokio_util::sync::CancellationToken;
//!
//! let component = Factory.create(Factory.default_config());
//! let report = component.start(&CancellationToken::new()).await?;
//! println!("{}", report);
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars), empty outside a git checkout
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod core;
pub mod ecs;
pub mod extension;
pub mod logging;
pub mod runtime;
pub mod system;
pub mod tuning;

// Re-exports for convenience
pub use config::Config;
pub use core::{Error, Result};
pub use extension::{CgroupRuntime, Factory, State};
pub use tuning::TuningReport;
