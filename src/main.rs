use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cgroup_runtime::config::Config;
use cgroup_runtime::extension::Factory;
use cgroup_runtime::{logging, runtime, VERSION};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging)?;

    info!("Starting cgroup_runtime {}", VERSION);
    config.log_summary();

    let component = Factory.create(config.tuning.clone());

    // Limits must be applied before the worker pool is sized
    let bootstrap = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = bootstrap.block_on(component.start(&CancellationToken::new()))?;
    drop(bootstrap);

    info!("Tuning applied: {}", report);

    let worker_threads = runtime::parallelism();
    info!(
        "Runtime: {} worker threads, memory ceiling {}",
        worker_threads,
        runtime::memory_ceiling()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        component.spawn_reevaluation();

        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutting down...");

        if let Err(e) = component.shutdown().await {
            warn!("Shutdown failed: {}", e);
        }
    });

    Ok(())
}
