//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use ofd_jobs_core::application::ValidationStatus;
use ofd_jobs_core::domain::{JobId, JobKind, JobStatus, SortOptions, ValidationType};
use serde::{Deserialize, Serialize};

/// validation.start.v1 - Launch a validation run
#[derive(Debug, Default, Deserialize)]
pub struct StartValidationRequest {
    #[serde(default)]
    pub validation_type: ValidationType,
}

/// sort.start.v1 - Launch a sort run
#[derive(Debug, Default, Deserialize)]
pub struct StartSortRequest {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub validate: bool,
    #[serde(default)]
    pub fix_indent_only: bool,
}

impl From<StartSortRequest> for SortOptions {
    fn from(req: StartSortRequest) -> Self {
        SortOptions {
            dry_run: req.dry_run,
            validate: req.validate,
            fix_indent_only: req.fix_indent_only,
        }
    }
}

/// Response for both launch methods
#[derive(Debug, Clone, Serialize)]
pub struct JobStartedResponse {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
}

/// validation.status.v1
pub type ValidationStatusResponse = ValidationStatus;

/// job.get.v1 - Fetch a full job record
#[derive(Debug, Deserialize)]
pub struct GetJobRequest {
    pub job_id: JobId,
}

/// job.progress.subscribe.v1 - Stream a job's events
#[derive(Debug, Deserialize)]
pub struct SubscribeProgressRequest {
    pub job_id: JobId,
}

/// admin.stats.v1 - Get daemon statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_jobs: usize,
    pub running_jobs: usize,
    pub complete_jobs: usize,
    pub error_jobs: usize,
    pub validation_locked: bool,
    pub uptime_seconds: u64,
}

/// admin.sweep.v1 - Run one sweep pass now
#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    pub evicted: usize,
    pub timed_out: usize,
}
