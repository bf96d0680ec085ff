// Progress Observer
// Pure reader over one job's event history: replay from zero, then follow

use crate::application::constants::PROGRESS_POLL_INTERVAL;
use crate::application::registry::{JobRegistry, RunState};
use crate::domain::{JobEvent, JobId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// One observer's cursor into a job's events
///
/// Never mutates the job. Bound to the run it attached to: a newer run
/// reusing the id, or eviction, does not cut the feed short. Dropping the
/// observer is the disconnect path and releases everything it holds.
pub struct JobObserver {
    state: Arc<RunState>,
    job_id: JobId,
    sent: usize,
    changed: watch::Receiver<usize>,
    poll_interval: Duration,
    closed: bool,
    saw_terminal: bool,
}

impl JobObserver {
    /// Attach to a job, `None` if the id is unknown
    pub async fn attach(registry: Arc<JobRegistry>, job_id: impl Into<JobId>) -> Option<Self> {
        let job_id = job_id.into();
        let attachment = registry.attach(&job_id).await?;

        debug!(job_id = %job_id, "Progress observer attached");

        Some(Self {
            state: attachment.state,
            job_id,
            sent: 0,
            changed: attachment.changed,
            poll_interval: PROGRESS_POLL_INTERVAL,
            closed: false,
            saw_terminal: false,
        })
    }

    /// Override the fallback poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Number of events delivered so far
    pub fn delivered(&self) -> usize {
        self.sent
    }

    /// True once the terminal event has been delivered
    pub fn saw_terminal(&self) -> bool {
        self.saw_terminal
    }

    /// Next batch of unseen events, in append order
    ///
    /// The first call replays the full history. Returns `None` once the
    /// terminal event has been delivered.
    pub async fn next_batch(&mut self) -> Option<Vec<JobEvent>> {
        loop {
            if self.closed {
                return None;
            }

            self.changed.borrow_and_update();

            let slice = self.state.read_from(self.sent).await;

            if slice.terminal {
                debug!(job_id = %self.job_id, "Observed job reached terminal state");
                self.closed = true;
                self.saw_terminal = true;
            }

            if !slice.events.is_empty() {
                self.sent += slice.events.len();
                return Some(slice.events);
            }

            if self.closed {
                return None;
            }

            tokio::select! {
                _ = self.changed.changed() => {},
                _ = tokio::time::sleep(self.poll_interval) => {},
            }
        }
    }
}
