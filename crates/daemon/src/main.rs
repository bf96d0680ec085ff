//! OFD Jobs Daemon - Main Entry Point
//! Serves validation/sort jobs and their live progress over JSON-RPC

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use config::DaemonConfig;
use ofd_jobs_api_rpc::{RpcHandler, RpcServer};
use ofd_jobs_core::application::{
    shutdown_channel, JobLauncher, JobRegistry, JobSweeper, ValidationLock,
};
use ofd_jobs_core::port::id_provider::UuidProvider;
use ofd_jobs_core::port::time_provider::SystemTimeProvider;
use ofd_jobs_core::port::{TaskExecutor, TimeProvider};
use ofd_jobs_infra_system::SubprocessExecutor;
use telemetry::LogSettings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bound on waiting for background tasks at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = telemetry::init_logging(&LogSettings::from_env())?;

    info!("ofd-jobs daemon v{} starting...", VERSION);

    // 2. Load configuration
    let config = DaemonConfig::from_env();
    info!(
        project_root = %config.project_root.display(),
        program = %config.program,
        program_args = ?config.program_args,
        "Configuration loaded"
    );
    if !config.project_root.is_dir() {
        warn!(
            project_root = %config.project_root.display(),
            "Project root is not a directory, jobs will fail to start"
        );
    }

    // 3. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let task_executor: Arc<dyn TaskExecutor> =
        Arc::new(SubprocessExecutor::new(time_provider.clone()));

    let registry = Arc::new(JobRegistry::new());
    let lock = Arc::new(ValidationLock::new());

    let launcher = Arc::new(JobLauncher::new(
        registry.clone(),
        lock.clone(),
        task_executor.clone(),
        id_provider,
        time_provider.clone(),
        config.tool_command(),
    ));

    // 4. Start sweeper
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let sweeper = Arc::new(JobSweeper::new(
        registry.clone(),
        lock.clone(),
        task_executor,
        time_provider,
        config.sweep.clone(),
    ));
    let sweeper_handle = tokio::spawn(sweeper.clone().run(shutdown_rx));

    // 5. Start JSON-RPC server
    let handler = Arc::new(RpcHandler::new(launcher, registry, lock, sweeper));
    let (addr, rpc_handle) = RpcServer::new(config.rpc.clone(), handler)
        .start()
        .await
        .context("RPC server start failed")?;

    info!(addr = %addr, "System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    shutdown_tx.shutdown();
    rpc_handle.stop().context("RPC server stop failed")?;
    if tokio::time::timeout(SHUTDOWN_GRACE, rpc_handle.stopped())
        .await
        .is_err()
    {
        warn!("RPC server did not stop in time");
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, sweeper_handle)
        .await
        .is_err()
    {
        warn!("Sweeper did not stop in time");
    }

    info!("Shutdown complete.");

    Ok(())
}
