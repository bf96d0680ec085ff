// Subprocess executor implementation
// Spawns the subordinate tool and streams its stdout back chunk by chunk
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ofd_jobs_core::application::constants::GRACEFUL_SHUTDOWN_TIMEOUT_MS;
use ofd_jobs_core::port::{
    CommandSpec, ExecutionError, ExitReport, ProcessOutput, SpawnedProcess, TaskExecutor,
    TimeProvider,
};

/// Buffered output messages per process before the reader applies backpressure
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Read size for stdout chunks
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Max stderr bytes kept for diagnostics; the rest is drained and dropped
pub const STDERR_CAPTURE_LIMIT: usize = 64 * 1024;

/// Liveness poll while waiting for SIGTERM to take effect
const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Subprocess executor
/// Child gets stdin from /dev/null and piped stdout/stderr
pub struct SubprocessExecutor {
    time_provider: Arc<dyn TimeProvider>,
}

impl SubprocessExecutor {
    /// Create a new subprocess executor
    ///
    /// # Arguments
    /// * `time_provider` - Clock for the SIGTERM grace period
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }

    /// Kill process with SIGTERM first, then SIGKILL if needed
    async fn kill_graceful(&self, pid: i32) -> Result<(), ExecutionError> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            info!(pid = %pid, "Sending SIGTERM for graceful shutdown");
            kill(Pid::from_raw(pid), Signal::SIGTERM)
                .map_err(|e| ExecutionError::Killed(format!("SIGTERM failed: {}", e)))?;

            let start_time = self.time_provider.now_millis();
            loop {
                tokio::time::sleep(TERMINATE_POLL_INTERVAL).await;

                if !self.is_alive(pid) {
                    info!(pid = %pid, "Process exited gracefully after SIGTERM");
                    return Ok(());
                }

                if self.time_provider.now_millis() - start_time > GRACEFUL_SHUTDOWN_TIMEOUT_MS {
                    warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
                    kill(Pid::from_raw(pid), Signal::SIGKILL)
                        .map_err(|e| ExecutionError::Killed(format!("SIGKILL failed: {}", e)))?;
                    return Ok(());
                }
            }
        }

        #[cfg(windows)]
        {
            use std::process::Command;

            let _ = &self.time_provider;
            info!(pid = %pid, "Killing process on Windows");
            let output = Command::new("taskkill")
                .args(["/F", "/PID", &pid.to_string()])
                .output()
                .map_err(|e| ExecutionError::Killed(e.to_string()))?;

            if !output.status.success() {
                return Err(ExecutionError::Killed(format!(
                    "taskkill failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                )));
            }

            Ok(())
        }
    }
}

/// Read a stream to EOF, keeping at most `limit` bytes
async fn read_capped<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
            Err(e) => {
                debug!(error = %e, "stderr read failed");
                break;
            }
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

/// Forward stdout, reap the child, then report its exit
///
/// Keeps reading after the receiver is gone so the child never blocks on a
/// full pipe.
async fn pump_output(mut child: Child, tx: mpsc::Sender<ProcessOutput>) {
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(read_capped(stderr, STDERR_CAPTURE_LIMIT)));

    if let Some(mut stdout) = child.stdout.take() {
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        let mut forwarding = true;
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if forwarding
                        && tx
                            .send(ProcessOutput::Stdout(buf[..n].to_vec()))
                            .await
                            .is_err()
                    {
                        debug!("Output receiver dropped, discarding remaining stdout");
                        forwarding = false;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "stdout read failed");
                    break;
                }
            }
        }
    }

    let code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(error = %e, "Failed to wait for subprocess");
            None
        }
    };

    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    let _ = tx.send(ProcessOutput::Exited(ExitReport { code, stderr })).await;
}

#[async_trait]
impl TaskExecutor for SubprocessExecutor {
    async fn spawn(&self, spec: &CommandSpec) -> Result<SpawnedProcess, ExecutionError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        info!(
            program = %spec.program,
            args = ?spec.args,
            working_dir = ?spec.working_dir,
            "Starting subprocess"
        );

        let child = command
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;
        let pid = child.id().and_then(|id| i32::try_from(id).ok());

        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        tokio::spawn(pump_output(child, tx));

        Ok(SpawnedProcess { pid, output: rx })
    }

    async fn terminate(&self, pid: i32) -> Result<(), ExecutionError> {
        self.kill_graceful(pid).await
    }

    fn is_alive(&self, pid: i32) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::kill;
            use nix::unistd::Pid;

            // No signal: existence check only
            kill(Pid::from_raw(pid), None).is_ok()
        }

        #[cfg(windows)]
        {
            use std::process::Command;

            let output = Command::new("tasklist")
                .args(["/FI", &format!("PID eq {}", pid), "/NH"])
                .output();

            if let Ok(output) = output {
                let output_str = String::from_utf8_lossy(&output.stdout);
                output_str.contains(&pid.to_string())
            } else {
                false
            }
        }
    }
}
