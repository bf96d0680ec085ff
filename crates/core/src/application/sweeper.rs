// Job Sweeper
// Periodic eviction of expired terminal jobs and timeout of stuck runs

use crate::application::constants::{
    DEFAULT_JOB_TIMEOUT_MS, DEFAULT_RETENTION_MS, DEFAULT_SWEEP_INTERVAL,
};
use crate::application::lock::ValidationLock;
use crate::application::registry::JobRegistry;
use crate::application::shutdown::ShutdownToken;
use crate::port::{TaskExecutor, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Sweeper timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    pub interval: Duration,
    /// Terminal jobs older than this (since end) are evicted
    pub retention_ms: i64,
    /// Running jobs older than this (since start) are forced to error
    pub timeout_ms: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            retention_ms: DEFAULT_RETENTION_MS,
            timeout_ms: DEFAULT_JOB_TIMEOUT_MS,
        }
    }
}

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    pub evicted: usize,
    pub timed_out: usize,
}

/// Background maintenance over the job registry
pub struct JobSweeper {
    registry: Arc<JobRegistry>,
    lock: Arc<ValidationLock>,
    task_executor: Arc<dyn TaskExecutor>,
    time_provider: Arc<dyn TimeProvider>,
    config: SweepConfig,
}

impl JobSweeper {
    pub fn new(
        registry: Arc<JobRegistry>,
        lock: Arc<ValidationLock>,
        task_executor: Arc<dyn TaskExecutor>,
        time_provider: Arc<dyn TimeProvider>,
        config: SweepConfig,
    ) -> Self {
        Self {
            registry,
            lock,
            task_executor,
            time_provider,
            config,
        }
    }

    /// Run one sweep pass
    ///
    /// Timed-out jobs get their lock released and their process terminated.
    /// The lock release is token-checked, so the run's own late completion
    /// cannot free a lock taken by a newer validation.
    pub async fn sweep_once(&self) -> SweepStats {
        let now = self.time_provider.now_millis();
        let outcome = self
            .registry
            .sweep(now, self.config.retention_ms, self.config.timeout_ms)
            .await;

        for job in &outcome.timed_out {
            warn!(
                job_id = %job.id,
                kind = %job.kind,
                pid = ?job.pid,
                timeout_secs = self.config.timeout_ms / 1000,
                "Job exceeded timeout, forcing to error"
            );

            if let Some(token) = job.lock_token {
                self.lock.release(token);
            }

            if let Some(pid) = job.pid {
                if let Err(e) = self.task_executor.terminate(pid).await {
                    warn!(job_id = %job.id, pid = pid, error = %e, "Failed to terminate timed-out process");
                }
            }
        }

        SweepStats {
            evicted: outcome.evicted.len(),
            timed_out: outcome.timed_out.len(),
        }
    }

    /// Sweep on every interval tick until shutdown
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_secs = self.config.retention_ms / 1000,
            timeout_secs = self.config.timeout_ms / 1000,
            "Job sweeper started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.wait() => {
                    info!("Job sweeper stopping");
                    break;
                }
            }
        }
    }
}
