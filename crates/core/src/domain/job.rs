// Job Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::event::JobEvent;
use serde::{Deserialize, Serialize};

/// Job ID
pub type JobId = String;

/// Epoch milliseconds
pub type Timestamp = i64;

/// Well-known id reused by every validation run (single-slot semantics)
pub const VALIDATION_JOB_ID: &str = "validation-current";

/// Kind of operation a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Validation,
    Sort,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Validation => write!(f, "validation"),
            JobKind::Sort => write!(f, "sort"),
        }
    }
}

/// Job Status
///
/// Monotonic: only `Running -> Complete` or `Running -> Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,

    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,

    /// Append-only, in emission order
    pub events: Vec<JobEvent>,
    pub result: Option<serde_json::Value>,

    /// Subordinate process id, cleared once the job is terminal
    pub pid: Option<i32>,
}

impl Job {
    /// Create a new running job
    ///
    /// # Arguments
    ///
    /// * `id` - Job ID (injected, not generated)
    /// * `kind` - Validation or sort
    /// * `start_time` - Start timestamp in epoch ms (injected, not system time)
    pub fn new(id: impl Into<String>, kind: JobKind, start_time: Timestamp) -> Self {
        Self {
            id: id.into(),
            kind,
            status: JobStatus::Running,
            start_time,
            end_time: None,
            events: Vec::new(),
            result: None,
            pid: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a progress (or other non-terminal) event
    pub fn push_event(&mut self, event: JobEvent) -> Result<()> {
        self.ensure_running("event")?;
        self.events.push(event);
        Ok(())
    }

    /// Record the subordinate process id
    pub fn attach_process(&mut self, pid: Option<i32>) -> Result<()> {
        self.ensure_running("process")?;
        self.pid = pid;
        Ok(())
    }

    /// Transition to Complete, attach the result and append the synthetic complete event
    pub fn complete(&mut self, now_millis: Timestamp, result: serde_json::Value) -> Result<()> {
        self.ensure_running("complete")?;
        self.events.push(JobEvent::Complete {
            result: result.clone(),
        });
        self.status = JobStatus::Complete;
        self.result = Some(result);
        self.finish(now_millis);
        Ok(())
    }

    /// Transition to Error and append the error event
    pub fn fail(
        &mut self,
        now_millis: Timestamp,
        message: impl Into<String>,
        diagnostic: Option<String>,
    ) -> Result<()> {
        self.ensure_running("error")?;
        self.events.push(JobEvent::Error {
            message: message.into(),
            diagnostic,
        });
        self.status = JobStatus::Error;
        self.finish(now_millis);
        Ok(())
    }

    /// Milliseconds since the job reached a terminal state
    pub fn terminal_age(&self, now_millis: Timestamp) -> Option<i64> {
        self.end_time.map(|end| now_millis - end)
    }

    /// Milliseconds since the job started
    pub fn running_age(&self, now_millis: Timestamp) -> i64 {
        now_millis - self.start_time
    }

    fn finish(&mut self, now_millis: Timestamp) {
        self.end_time = Some(now_millis);
        self.pid = None;
    }

    fn ensure_running(&self, to: &str) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
