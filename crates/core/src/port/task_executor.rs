// Task Executor Port
// Abstraction for launching the subordinate validator/sorter process

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Fully resolved process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

/// How the subordinate process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured diagnostic channel (stderr) text
    pub stderr: String,
}

/// Output delivered from a running process, in order
///
/// `Exited` is always the last message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    Stdout(Vec<u8>),
    Exited(ExitReport),
}

/// Handle to a spawned process
#[derive(Debug)]
pub struct SpawnedProcess {
    pub pid: Option<i32>,
    pub output: mpsc::Receiver<ProcessOutput>,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process killed: {0}")]
    Killed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Task Executor trait
///
/// Implementations:
/// - SubprocessExecutor: spawns the external process (infra-system)
/// - MockTaskExecutor: scripted output for tests
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Spawn a process and stream its output
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if process cannot be started
    async fn spawn(&self, spec: &CommandSpec) -> Result<SpawnedProcess, ExecutionError>;

    /// Ask a running process to stop (graceful signal first)
    ///
    /// # Errors
    /// - ExecutionError::Killed if process cannot be signalled
    async fn terminate(&self, pid: i32) -> Result<(), ExecutionError>;

    /// Check if a process is still alive
    fn is_alive(&self, pid: i32) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const MANUAL_CHANNEL_CAPACITY: usize = 64;

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Emit the stdout chunks, then exit
        Scripted {
            stdout: Vec<String>,
            exit_code: Option<i32>,
            stderr: String,
        },
        /// Refuse to spawn
        SpawnFail(String),
        /// Stay alive until driven with `emit`/`exit` or terminated
        Manual,
    }

    /// Mock Task Executor for testing
    pub struct MockTaskExecutor {
        behavior: Mutex<MockBehavior>,
        next_pid: AtomicI32,
        live: Mutex<HashMap<i32, mpsc::Sender<ProcessOutput>>>,
        spawned: Mutex<Vec<CommandSpec>>,
        terminated: Mutex<Vec<i32>>,
    }

    impl MockTaskExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                next_pid: AtomicI32::new(1000),
                live: Mutex::new(HashMap::new()),
                spawned: Mutex::new(Vec::new()),
                terminated: Mutex::new(Vec::new()),
            }
        }

        pub fn scripted(stdout: Vec<&str>, exit_code: i32) -> Self {
            Self::new(MockBehavior::Scripted {
                stdout: stdout.into_iter().map(|s| s.to_string()).collect(),
                exit_code: Some(exit_code),
                stderr: String::new(),
            })
        }

        pub fn manual() -> Self {
            Self::new(MockBehavior::Manual)
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn spawn_count(&self) -> usize {
            self.spawned.lock().unwrap().len()
        }

        pub fn spawned_specs(&self) -> Vec<CommandSpec> {
            self.spawned.lock().unwrap().clone()
        }

        pub fn terminated(&self) -> Vec<i32> {
            self.terminated.lock().unwrap().clone()
        }

        pub fn live_pids(&self) -> Vec<i32> {
            let mut pids: Vec<i32> = self.live.lock().unwrap().keys().copied().collect();
            pids.sort_unstable();
            pids
        }

        /// Poll until `count` spawns have been requested
        pub async fn wait_for_spawns(&self, count: usize) -> Vec<CommandSpec> {
            for _ in 0..400 {
                let specs = self.spawned_specs();
                if specs.len() >= count {
                    return specs;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("expected {} spawn requests", count);
        }

        /// Poll until `count` manual processes are alive
        pub async fn wait_for_live(&self, count: usize) -> Vec<i32> {
            for _ in 0..400 {
                let pids = self.live_pids();
                if pids.len() >= count {
                    return pids;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("expected {} live mock processes", count);
        }

        /// Write a stdout chunk for a manual process
        pub fn emit(&self, pid: i32, chunk: &str) -> bool {
            let live = self.live.lock().unwrap();
            match live.get(&pid) {
                Some(tx) => tx
                    .try_send(ProcessOutput::Stdout(chunk.as_bytes().to_vec()))
                    .is_ok(),
                None => false,
            }
        }

        /// Exit a manual process
        pub fn exit(&self, pid: i32, code: Option<i32>, stderr: &str) -> bool {
            let tx = self.live.lock().unwrap().remove(&pid);
            match tx {
                Some(tx) => tx
                    .try_send(ProcessOutput::Exited(ExitReport {
                        code,
                        stderr: stderr.to_string(),
                    }))
                    .is_ok(),
                None => false,
            }
        }
    }

    #[async_trait]
    impl TaskExecutor for MockTaskExecutor {
        async fn spawn(&self, spec: &CommandSpec) -> Result<SpawnedProcess, ExecutionError> {
            self.spawned.lock().unwrap().push(spec.clone());

            let behavior = self.behavior.lock().unwrap().clone();
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);

            match behavior {
                MockBehavior::Scripted {
                    stdout,
                    exit_code,
                    stderr,
                } => {
                    let (tx, rx) = mpsc::channel(stdout.len() + 1);
                    for chunk in stdout {
                        let _ = tx.try_send(ProcessOutput::Stdout(chunk.into_bytes()));
                    }
                    let _ = tx.try_send(ProcessOutput::Exited(ExitReport {
                        code: exit_code,
                        stderr,
                    }));
                    Ok(SpawnedProcess {
                        pid: Some(pid),
                        output: rx,
                    })
                }
                MockBehavior::SpawnFail(msg) => Err(ExecutionError::SpawnFailed(msg)),
                MockBehavior::Manual => {
                    let (tx, rx) = mpsc::channel(MANUAL_CHANNEL_CAPACITY);
                    self.live.lock().unwrap().insert(pid, tx);
                    Ok(SpawnedProcess {
                        pid: Some(pid),
                        output: rx,
                    })
                }
            }
        }

        async fn terminate(&self, pid: i32) -> Result<(), ExecutionError> {
            self.terminated.lock().unwrap().push(pid);
            self.exit(pid, None, "terminated");
            Ok(())
        }

        fn is_alive(&self, pid: i32) -> bool {
            self.live.lock().unwrap().contains_key(&pid)
        }
    }
}
