// Job Launcher
// Starts validation/sort runs, streams subordinate output into the registry
// and finalizes the job on exit

use crate::application::command::ToolCommand;
use crate::application::constants::SORT_JOB_ID_PREFIX;
use crate::application::lock::{ValidationLock, ValidationPermit};
use crate::application::registry::{JobRegistry, RunTicket};
use crate::domain::{JobId, JobKind, OutputParser, SortOptions, ValidationOptions, VALIDATION_JOB_ID};
use crate::error::{AppError, Result};
use crate::port::{CommandSpec, ExitReport, IdProvider, ProcessOutput, TaskExecutor, TimeProvider};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Terminal outcome of one run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Complete(Value),
    Failed {
        message: String,
        diagnostic: Option<String>,
    },
}

/// Map the subordinate's exit to a job outcome
///
/// Exit 0 is clean success and exit 1 means "completed with findings"; both
/// are complete. Anything else, including death by signal, is an error.
pub fn outcome_for_exit(exit: &ExitReport, result: Option<Value>) -> RunOutcome {
    match exit.code {
        Some(code @ (0 | 1)) => RunOutcome::Complete(
            result.unwrap_or_else(|| json!({ "success": code == 0, "exit_code": code })),
        ),
        Some(code) => RunOutcome::Failed {
            message: format!("Process exited with code {}", code),
            diagnostic: diagnostic_text(&exit.stderr),
        },
        None => RunOutcome::Failed {
            message: "Process terminated by signal".to_string(),
            diagnostic: diagnostic_text(&exit.stderr),
        },
    }
}

fn diagnostic_text(stderr: &str) -> Option<String> {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Launches jobs against the shared registry and lock
pub struct JobLauncher {
    registry: Arc<JobRegistry>,
    lock: Arc<ValidationLock>,
    task_executor: Arc<dyn TaskExecutor>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    command: ToolCommand,
}

impl JobLauncher {
    pub fn new(
        registry: Arc<JobRegistry>,
        lock: Arc<ValidationLock>,
        task_executor: Arc<dyn TaskExecutor>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        command: ToolCommand,
    ) -> Self {
        Self {
            registry,
            lock,
            task_executor,
            id_provider,
            time_provider,
            command,
        }
    }

    /// Start a validation run
    ///
    /// # Errors
    /// - AppError::AlreadyRunning if another validation holds the lock
    pub async fn launch_validation(&self, opts: ValidationOptions) -> Result<JobId> {
        let Some(permit) = self.lock.try_acquire() else {
            let job_id = self
                .registry
                .find_running(JobKind::Validation)
                .await
                .map(|job| job.id)
                .unwrap_or_else(|| VALIDATION_JOB_ID.to_string());
            info!(job_id = %job_id, "Validation launch rejected, already running");
            return Err(AppError::AlreadyRunning { job_id });
        };

        let now = self.time_provider.now_millis();
        // On error the permit drops here and the lock is released
        let (_, ticket) = self
            .registry
            .register(VALIDATION_JOB_ID, JobKind::Validation, now, Some(permit.token()))
            .await?;

        let spec = self.command.validation(&opts);
        info!(
            job_id = VALIDATION_JOB_ID,
            validation_type = ?opts.validation_type,
            "Validation job started"
        );
        self.spawn_run(ticket, spec, Some(permit));

        Ok(VALIDATION_JOB_ID.to_string())
    }

    /// Start a sort run (never serialized against other sorts)
    pub async fn launch_sort(&self, opts: SortOptions) -> Result<JobId> {
        let job_id = format!("{}{}", SORT_JOB_ID_PREFIX, self.id_provider.generate_id());
        let now = self.time_provider.now_millis();
        let (_, ticket) = self
            .registry
            .register(job_id.clone(), JobKind::Sort, now, None)
            .await?;

        let spec = self.command.sort(&opts);
        info!(
            job_id = %job_id,
            dry_run = opts.dry_run,
            validate = opts.validate,
            "Sort job started"
        );
        self.spawn_run(ticket, spec, None);

        Ok(job_id)
    }

    fn spawn_run(&self, ticket: RunTicket, spec: CommandSpec, permit: Option<ValidationPermit>) {
        let run = JobRun {
            ticket,
            spec,
            registry: Arc::clone(&self.registry),
            task_executor: Arc::clone(&self.task_executor),
            time_provider: Arc::clone(&self.time_provider),
            permit,
        };
        tokio::spawn(run.execute());
    }
}

/// Background task owning one run from spawn to finalization
struct JobRun {
    ticket: RunTicket,
    spec: CommandSpec,
    registry: Arc<JobRegistry>,
    task_executor: Arc<dyn TaskExecutor>,
    time_provider: Arc<dyn TimeProvider>,
    /// Released together with the terminal transition
    permit: Option<ValidationPermit>,
}

impl JobRun {
    async fn execute(self) {
        let outcome = match self.task_executor.spawn(&self.spec).await {
            Ok(process) => {
                if let Err(e) = self
                    .registry
                    .update_run(&self.ticket, |job| job.attach_process(process.pid))
                    .await
                {
                    debug!(job_id = %self.ticket.id, error = %e, "Could not record pid");
                }
                info!(job_id = %self.ticket.id, pid = ?process.pid, "Subordinate process spawned");
                self.drain(process.output).await
            }
            Err(e) => {
                error!(
                    job_id = %self.ticket.id,
                    program = %self.spec.program,
                    error = %e,
                    "Failed to spawn subordinate process"
                );
                RunOutcome::Failed {
                    message: format!("Failed to start process: {}", e),
                    diagnostic: None,
                }
            }
        };

        self.finalize(outcome).await;
    }

    async fn drain(&self, mut output: tokio::sync::mpsc::Receiver<ProcessOutput>) -> RunOutcome {
        let mut parser = OutputParser::new();
        let mut exit = None;

        while let Some(message) = output.recv().await {
            match message {
                ProcessOutput::Stdout(chunk) => {
                    for event in parser.feed(&chunk) {
                        if let Err(e) = self
                            .registry
                            .update_run(&self.ticket, |job| job.push_event(event.into()))
                            .await
                        {
                            // Job already forced terminal (timeout); keep draining
                            debug!(job_id = %self.ticket.id, error = %e, "Dropping progress event");
                        }
                    }
                }
                ProcessOutput::Exited(report) => {
                    exit = Some(report);
                    break;
                }
            }
        }

        let exit = exit.unwrap_or_else(|| {
            warn!(job_id = %self.ticket.id, "Output channel closed without exit status");
            ExitReport {
                code: None,
                stderr: String::new(),
            }
        });

        info!(job_id = %self.ticket.id, exit_code = ?exit.code, "Subordinate process exited");
        outcome_for_exit(&exit, parser.finish())
    }

    async fn finalize(mut self, outcome: RunOutcome) {
        let now = self.time_provider.now_millis();
        let permit = self.permit.take();
        let recorded = match outcome {
            RunOutcome::Complete(result) => {
                self.registry
                    .update_run(&self.ticket, move |job| {
                        let recorded = job.complete(now, result);
                        drop(permit);
                        recorded
                    })
                    .await
            }
            RunOutcome::Failed {
                message,
                diagnostic,
            } => {
                warn!(job_id = %self.ticket.id, message = %message, "Job failed");
                self.registry
                    .update_run(&self.ticket, move |job| {
                        let recorded = job.fail(now, message, diagnostic);
                        drop(permit);
                        recorded
                    })
                    .await
            }
        };

        match recorded {
            Ok(()) => info!(job_id = %self.ticket.id, "Job finished"),
            Err(e) => debug!(
                job_id = %self.ticket.id,
                error = %e,
                "Job already terminal or superseded, outcome discarded"
            ),
        }
    }
}
