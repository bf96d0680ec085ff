// Job Registry
// Process-wide id -> Job map with lifecycle and sweep logic

use crate::application::lock::LockToken;
use crate::domain::{Job, JobEvent, JobId, JobKind, JobStatus, Timestamp};
use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

/// State of one run, shared between the registry and its observers
///
/// Observers keep their run's state alive, so a run replaced or evicted from
/// the map can still be drained up to its terminal event.
pub(crate) struct RunState {
    job: RwLock<Job>,
    /// Carries the current event count, bumped on every mutation
    changed: watch::Sender<usize>,
}

impl RunState {
    fn new(job: Job) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            job: RwLock::new(job),
            changed,
        }
    }

    fn notify(&self, job: &Job) {
        self.changed.send_replace(job.events.len());
    }

    /// Events from `offset` on, read under one lock
    pub(crate) async fn read_from(&self, offset: usize) -> EventSlice {
        let job = self.job.read().await;
        EventSlice {
            events: job.events.iter().skip(offset).cloned().collect(),
            terminal: job.is_terminal(),
        }
    }
}

/// One registered run
struct Slot {
    /// Distinguishes successive runs that reuse the same id
    run: u64,
    lock_token: Option<LockToken>,
    state: Arc<RunState>,
}

/// Running job forced to error by a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedOutJob {
    pub id: JobId,
    pub kind: JobKind,
    pub pid: Option<i32>,
    pub lock_token: Option<LockToken>,
}

/// Result of one registry sweep pass
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub evicted: Vec<JobId>,
    pub timed_out: Vec<TimedOutJob>,
}

/// Job counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub total: usize,
    pub running: usize,
    pub complete: usize,
    pub error: usize,
}

/// Events at or after an observer's offset
#[derive(Debug)]
pub(crate) struct EventSlice {
    pub events: Vec<JobEvent>,
    pub terminal: bool,
}

/// Identifies one run of a job, so a superseded run cannot touch its successor
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunTicket {
    pub id: JobId,
    pub run: u64,
}

/// What an observer holds onto after attaching
pub(crate) struct Attachment {
    pub state: Arc<RunState>,
    pub changed: watch::Receiver<usize>,
}

/// In-memory job registry
///
/// Owned by the serving process and shared by `Arc`; nothing is persisted.
/// Lock order is map first, then a run's job.
#[derive(Default)]
pub struct JobRegistry {
    slots: RwLock<HashMap<JobId, Slot>>,
    next_run: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new running job
    ///
    /// A terminal record with the same id is evicted first; a running one is a
    /// conflict and is left untouched.
    pub async fn create(
        &self,
        id: impl Into<JobId>,
        kind: JobKind,
        now_millis: Timestamp,
        lock_token: Option<LockToken>,
    ) -> Result<Job> {
        self.register(id, kind, now_millis, lock_token)
            .await
            .map(|(job, _)| job)
    }

    /// Insert a new running job and return the ticket for its run
    pub(crate) async fn register(
        &self,
        id: impl Into<JobId>,
        kind: JobKind,
        now_millis: Timestamp,
        lock_token: Option<LockToken>,
    ) -> Result<(Job, RunTicket)> {
        let id = id.into();
        let mut slots = self.slots.write().await;

        if let Some(existing) = slots.get(&id) {
            if !existing.state.job.read().await.is_terminal() {
                return Err(AppError::Conflict(format!("Job {} is still running", id)));
            }
            debug!(job_id = %id, "Evicting terminal job before reuse");
        }

        let job = Job::new(id.clone(), kind, now_millis);
        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        let slot = Slot {
            run,
            lock_token,
            state: Arc::new(RunState::new(job.clone())),
        };
        slots.insert(id.clone(), slot);

        Ok((job, RunTicket { id, run }))
    }

    /// Find job by ID (snapshot)
    pub async fn get(&self, id: &str) -> Option<Job> {
        let slots = self.slots.read().await;
        let slot = slots.get(id)?;
        let job = slot.state.job.read().await.clone();
        Some(job)
    }

    /// The running job of a kind, if any (at most one for validation)
    pub async fn find_running(&self, kind: JobKind) -> Option<Job> {
        let slots = self.slots.read().await;
        for slot in slots.values() {
            let job = slot.state.job.read().await;
            if job.kind == kind && job.status == JobStatus::Running {
                return Some(job.clone());
            }
        }
        None
    }

    /// Apply `f` to the job only while `ticket`'s run is still registered
    pub(crate) async fn update_run<F>(&self, ticket: &RunTicket, f: F) -> Result<()>
    where
        F: FnOnce(&mut Job) -> crate::domain::error::Result<()>,
    {
        self.mutate(&ticket.id, Some(ticket.run), f).await
    }

    /// Evict aged terminal jobs and force over-age running jobs to error
    pub async fn sweep(
        &self,
        now_millis: Timestamp,
        retention_ms: i64,
        timeout_ms: i64,
    ) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let mut slots = self.slots.write().await;

        for (id, slot) in slots.iter() {
            let mut job = slot.state.job.write().await;
            match job.terminal_age(now_millis) {
                Some(age) if age > retention_ms => outcome.evicted.push(id.clone()),
                Some(_) => {}
                None if job.running_age(now_millis) > timeout_ms => {
                    let pid = job.pid;
                    let message = format!("Job timed out after {}s", timeout_ms / 1000);
                    if job.fail(now_millis, message, None).is_ok() {
                        slot.state.notify(&job);
                        outcome.timed_out.push(TimedOutJob {
                            id: id.clone(),
                            kind: job.kind,
                            pid,
                            lock_token: slot.lock_token,
                        });
                    }
                }
                None => {}
            }
        }

        for id in &outcome.evicted {
            slots.remove(id);
        }

        if !outcome.evicted.is_empty() || !outcome.timed_out.is_empty() {
            info!(
                evicted = outcome.evicted.len(),
                timed_out = outcome.timed_out.len(),
                remaining = slots.len(),
                "Registry sweep removed or expired jobs"
            );
        }

        outcome
    }

    /// Count jobs by status
    pub async fn counts(&self) -> JobCounts {
        let slots = self.slots.read().await;
        let mut counts = JobCounts {
            total: slots.len(),
            ..Default::default()
        };
        for slot in slots.values() {
            match slot.state.job.read().await.status {
                JobStatus::Running => counts.running += 1,
                JobStatus::Complete => counts.complete += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    pub(crate) async fn attach(&self, id: &str) -> Option<Attachment> {
        self.slots.read().await.get(id).map(|slot| Attachment {
            state: Arc::clone(&slot.state),
            changed: slot.state.changed.subscribe(),
        })
    }

    async fn mutate<F>(&self, id: &str, run: Option<u64>, f: F) -> Result<()>
    where
        F: FnOnce(&mut Job) -> crate::domain::error::Result<()>,
    {
        let slots = self.slots.read().await;
        let slot = slots
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
        if run.is_some_and(|run| run != slot.run) {
            return Err(AppError::InvalidState(format!(
                "Run of job {} was superseded",
                id
            )));
        }
        let mut job = slot.state.job.write().await;
        f(&mut *job)?;
        slot.state.notify(&job);
        Ok(())
    }
}

/// Id-addressed mutations for tests that drive the registry directly
#[cfg(test)]
impl JobRegistry {
    pub(crate) async fn attach_process(&self, id: &str, pid: Option<i32>) -> Result<()> {
        self.mutate(id, None, |job| job.attach_process(pid)).await
    }

    pub(crate) async fn append_event(&self, id: &str, event: JobEvent) -> Result<()> {
        self.mutate(id, None, |job| job.push_event(event)).await
    }

    pub(crate) async fn complete(
        &self,
        id: &str,
        now_millis: Timestamp,
        result: serde_json::Value,
    ) -> Result<()> {
        self.mutate(id, None, |job| job.complete(now_millis, result))
            .await
    }

    pub(crate) async fn fail(
        &self,
        id: &str,
        now_millis: Timestamp,
        message: impl Into<String>,
        diagnostic: Option<String>,
    ) -> Result<()> {
        let message = message.into();
        self.mutate(id, None, |job| job.fail(now_millis, message, diagnostic))
            .await
    }
}
