//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from the api-rpc crate.

use serde::{Deserialize, Serialize};

/// Validation scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    #[default]
    All,
    JsonFiles,
    Logos,
    FolderNames,
    StoreIds,
    Gtin,
}

/// Request to start a validation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationRequest {
    pub validation_type: ValidationType,
}

/// Request to start a sort run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SortRequest {
    pub dry_run: bool,
    pub validate: bool,
    pub fix_indent_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Validation,
    Sort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Complete,
    Error,
}

/// Response from either launch method
#[derive(Debug, Clone, Deserialize)]
pub struct JobStartedResponse {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
}

/// Response from validation.status.v1
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationStatus {
    pub running: bool,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Progress report from the subordinate tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub percent: f64,
    #[serde(default)]
    pub message: String,
    /// Fields the tool reports beyond the standard ones
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of a job's event history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobEvent {
    Progress(ProgressEvent),
    Complete {
        result: serde_json::Value,
    },
    Error {
        message: String,
        #[serde(default)]
        diagnostic: Option<String>,
    },
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress(_))
    }
}

/// Full job record from job.get.v1
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub events: Vec<JobEvent>,
    pub result: Option<serde_json::Value>,
    pub pid: Option<i32>,
}

/// Request carrying a job id
#[derive(Debug, Clone, Serialize)]
pub struct JobIdRequest {
    pub job_id: String,
}

/// Response from admin.stats.v1
#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    pub total_jobs: usize,
    pub running_jobs: usize,
    pub complete_jobs: usize,
    pub error_jobs: usize,
    pub validation_locked: bool,
    pub uptime_seconds: u64,
}

/// Response from admin.sweep.v1
#[derive(Debug, Clone, Deserialize)]
pub struct SweepResponse {
    pub evicted: usize,
    pub timed_out: usize,
}
