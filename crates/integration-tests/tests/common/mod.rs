//! Shared fixtures: the real subprocess executor driven by `sh -c` scripts
//! that speak the validator's output contract.

#![allow(dead_code)]

use ofd_jobs_core::application::{
    JobLauncher, JobRegistry, JobSweeper, SweepConfig, ToolCommand, ValidationLock,
};
use ofd_jobs_core::domain::Job;
use ofd_jobs_core::port::id_provider::UuidProvider;
use ofd_jobs_core::port::{TaskExecutor, TimeProvider};
use ofd_jobs_infra_system::SubprocessExecutor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const PROGRESS_50: &str =
    r#"printf '%s\n' '{"type": "progress", "stage": "folder-names", "percent": 50, "message": ""}'"#;
pub const VALID_RESULT: &str =
    r#"printf '%s\n' '{"errors": [], "error_count": 0, "warning_count": 0, "is_valid": true}'"#;

pub struct Stack {
    pub registry: Arc<JobRegistry>,
    pub lock: Arc<ValidationLock>,
    pub launcher: Arc<JobLauncher>,
    pub sweeper: Arc<JobSweeper>,
}

/// Wire the real executor to a tool command that runs `script`
///
/// The launcher appends its subcommand argv, visible to the script as `$@`.
pub fn stack(script: &str, time_provider: Arc<dyn TimeProvider>, sweep: SweepConfig) -> Stack {
    stack_with_command(
        ToolCommand::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            None,
        ),
        time_provider,
        sweep,
    )
}

pub fn stack_with_command(
    command: ToolCommand,
    time_provider: Arc<dyn TimeProvider>,
    sweep: SweepConfig,
) -> Stack {
    let registry = Arc::new(JobRegistry::new());
    let lock = Arc::new(ValidationLock::new());
    let executor: Arc<dyn TaskExecutor> =
        Arc::new(SubprocessExecutor::new(time_provider.clone()));

    let launcher = Arc::new(JobLauncher::new(
        registry.clone(),
        lock.clone(),
        executor.clone(),
        Arc::new(UuidProvider),
        time_provider.clone(),
        command,
    ));
    let sweeper = Arc::new(JobSweeper::new(
        registry.clone(),
        lock.clone(),
        executor,
        time_provider,
        sweep,
    ));

    Stack {
        registry,
        lock,
        launcher,
        sweeper,
    }
}

/// Poll until the job is terminal
pub async fn wait_terminal(registry: &JobRegistry, job_id: &str) -> Job {
    wait_for(registry, job_id, |job| job.is_terminal()).await
}

pub async fn wait_for(registry: &JobRegistry, job_id: &str, ready: impl Fn(&Job) -> bool) -> Job {
    for _ in 0..500 {
        if let Some(job) = registry.get(job_id).await {
            if ready(&job) {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} did not reach the expected state", job_id);
}

/// A file path the test creates to let a gated script finish
pub struct Gate {
    pub path: PathBuf,
}

impl Gate {
    pub fn new() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "ofd-jobs-gate-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_file(&path);
        Self { path }
    }

    /// Shell snippet that blocks until the gate opens
    pub fn wait_snippet(&self) -> String {
        format!(
            "while [ ! -f '{}' ]; do sleep 0.05; done",
            self.path.display()
        )
    }

    pub fn open(&self) {
        std::fs::write(&self.path, b"open").unwrap();
    }
}

impl Drop for Gate {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
