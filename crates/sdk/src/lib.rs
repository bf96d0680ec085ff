//! OFD Jobs SDK - Rust Client Library
//!
//! Client for the ofd job daemon: launch validation and sort runs, query
//! status, and follow a job's progress live.
//!
//! # Example
//!
//! ```no_run
//! use ofd_jobs_sdk::{OfdJobsClient, ValidationType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OfdJobsClient::connect("http://127.0.0.1:9630").await?;
//!
//!     let job_id = match client.start_validation(ValidationType::All).await {
//!         Ok(started) => started.job_id,
//!         // Already running: attach to the existing run
//!         Err(e) => match e.running_job_id() {
//!             Some(id) => id.to_string(),
//!             None => return Err(e.into()),
//!         },
//!     };
//!
//!     let mut progress = client.subscribe_progress(&job_id).await?;
//!     while let Some(event) = progress.next().await {
//!         println!("{:?}", event?);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::{OfdJobsClient, ProgressSubscription};
pub use error::{Result, SdkError, CONFLICT_CODE};
pub use types::{
    Job, JobEvent, JobIdRequest, JobKind, JobStartedResponse, JobStatus, ProgressEvent,
    SortRequest, StatsResponse, SweepResponse, ValidationRequest, ValidationStatus,
    ValidationType,
};
