//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::types::{
    GetJobRequest, JobStartedResponse, StartSortRequest, StartValidationRequest, StatsResponse,
    SweepResponse, ValidationStatusResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use ofd_jobs_core::application::{
    running_validation, JobLauncher, JobObserver, JobRegistry, JobSweeper, ValidationLock,
};
use ofd_jobs_core::domain::{Job, JobKind, JobStatus, ValidationOptions};
use ofd_jobs_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    launcher: Arc<JobLauncher>,
    registry: Arc<JobRegistry>,
    lock: Arc<ValidationLock>,
    sweeper: Arc<JobSweeper>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        launcher: Arc<JobLauncher>,
        registry: Arc<JobRegistry>,
        lock: Arc<ValidationLock>,
        sweeper: Arc<JobSweeper>,
    ) -> Self {
        Self {
            launcher,
            registry,
            lock,
            sweeper,
            start_time: Instant::now(),
        }
    }

    /// validation.start.v1
    pub async fn start_validation(
        &self,
        params: StartValidationRequest,
    ) -> Result<JobStartedResponse, ErrorObjectOwned> {
        let job_id = self
            .launcher
            .launch_validation(ValidationOptions {
                validation_type: params.validation_type,
            })
            .await
            .map_err(to_rpc_error)?;

        Ok(JobStartedResponse {
            job_id,
            kind: JobKind::Validation,
            status: JobStatus::Running,
        })
    }

    /// sort.start.v1
    pub async fn start_sort(
        &self,
        params: StartSortRequest,
    ) -> Result<JobStartedResponse, ErrorObjectOwned> {
        let job_id = self
            .launcher
            .launch_sort(params.into())
            .await
            .map_err(to_rpc_error)?;

        Ok(JobStartedResponse {
            job_id,
            kind: JobKind::Sort,
            status: JobStatus::Running,
        })
    }

    /// validation.status.v1
    pub async fn validation_status(&self) -> ValidationStatusResponse {
        running_validation(&self.registry).await
    }

    /// job.get.v1
    pub async fn get_job(&self, params: GetJobRequest) -> Result<Job, ErrorObjectOwned> {
        self.registry
            .get(&params.job_id)
            .await
            .ok_or_else(|| job_not_found(&params.job_id))
    }

    /// Attach a progress observer for job.progress.subscribe.v1
    pub async fn observe(&self, job_id: &str) -> Result<JobObserver, ErrorObjectOwned> {
        JobObserver::attach(Arc::clone(&self.registry), job_id)
            .await
            .ok_or_else(|| job_not_found(job_id))
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> StatsResponse {
        let counts = self.registry.counts().await;

        StatsResponse {
            total_jobs: counts.total,
            running_jobs: counts.running,
            complete_jobs: counts.complete,
            error_jobs: counts.error,
            validation_locked: self.lock.is_locked(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// admin.sweep.v1
    pub async fn sweep(&self) -> SweepResponse {
        let stats = self.sweeper.sweep_once().await;

        SweepResponse {
            evicted: stats.evicted,
            timed_out: stats.timed_out,
        }
    }
}

fn job_not_found(job_id: &str) -> ErrorObjectOwned {
    to_rpc_error(AppError::NotFound(format!("Job {} not found", job_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use ofd_jobs_core::application::{SweepConfig, ToolCommand};
    use ofd_jobs_core::port::id_provider::mocks::SequentialIdProvider;
    use ofd_jobs_core::port::task_executor::mocks::MockTaskExecutor;
    use ofd_jobs_core::port::time_provider::mocks::ManualTimeProvider;

    fn handler(executor: Arc<MockTaskExecutor>) -> RpcHandler {
        let registry = Arc::new(JobRegistry::new());
        let lock = Arc::new(ValidationLock::new());
        let clock = Arc::new(ManualTimeProvider::new(0));
        let launcher = Arc::new(JobLauncher::new(
            registry.clone(),
            lock.clone(),
            executor.clone(),
            Arc::new(SequentialIdProvider::new()),
            clock.clone(),
            ToolCommand::default(),
        ));
        let sweeper = Arc::new(JobSweeper::new(
            registry.clone(),
            lock.clone(),
            executor,
            clock,
            SweepConfig::default(),
        ));
        RpcHandler::new(launcher, registry, lock, sweeper)
    }

    #[tokio::test]
    async fn test_second_validation_conflicts_with_job_id() {
        let handler = handler(Arc::new(MockTaskExecutor::manual()));

        let started = handler
            .start_validation(StartValidationRequest::default())
            .await
            .unwrap();
        assert_eq!(started.job_id, "validation-current");

        let err = handler
            .start_validation(StartValidationRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);
        assert!(err.data().unwrap().get().contains("validation-current"));

        let status = handler.validation_status().await;
        assert!(status.running);
        assert!(handler.stats().await.validation_locked);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let handler = handler(Arc::new(MockTaskExecutor::manual()));

        let err = handler
            .get_job(GetJobRequest {
                job_id: "sort-missing".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);

        let err = handler.observe("sort-missing").await.err().unwrap();
        assert_eq!(err.code(), code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sort_jobs_counted() {
        let handler = handler(Arc::new(MockTaskExecutor::manual()));
        handler.start_sort(StartSortRequest::default()).await.unwrap();
        handler.start_sort(StartSortRequest::default()).await.unwrap();

        let stats = handler.stats().await;
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.running_jobs, 2);
        assert!(!stats.validation_locked);
        assert_eq!(handler.sweep().await.evicted, 0);
    }
}
