// Validation Status Query
// Lets a reloaded client find and re-attach to the running validation

use crate::application::registry::JobRegistry;
use crate::domain::{JobId, JobKind, JobStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// `{running: false}` or `{running: true, job_id, start_time, status}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl ValidationStatus {
    pub fn idle() -> Self {
        Self {
            running: false,
            job_id: None,
            start_time: None,
            status: None,
        }
    }
}

/// Pure read of the running validation job
pub async fn running_validation(registry: &JobRegistry) -> ValidationStatus {
    match registry.find_running(JobKind::Validation).await {
        Some(job) => ValidationStatus {
            running: true,
            job_id: Some(job.id),
            start_time: Some(job.start_time),
            status: Some(job.status),
        },
        None => ValidationStatus::idle(),
    }
}
