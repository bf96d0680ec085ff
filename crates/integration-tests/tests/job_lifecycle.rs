//! Job Lifecycle Integration Tests
//!
//! Runs real subprocesses through launcher, registry, observer and sweeper.

mod common;

use common::{stack, wait_for, wait_terminal, Gate, PROGRESS_50, VALID_RESULT};
use ofd_jobs_core::application::{running_validation, JobObserver, SweepConfig, ToolCommand};
use ofd_jobs_core::domain::{
    JobEvent, JobStatus, ProgressEvent, SortOptions, ValidationOptions, ValidationType,
    VALIDATION_JOB_ID,
};
use ofd_jobs_core::error::AppError;
use ofd_jobs_core::port::time_provider::mocks::ManualTimeProvider;
use ofd_jobs_core::port::time_provider::SystemTimeProvider;
use std::sync::Arc;
use std::time::Duration;

fn system_stack(script: &str) -> common::Stack {
    stack(script, Arc::new(SystemTimeProvider), SweepConfig::default())
}

/// Validation with progress, a noise line and a result completes
#[tokio::test]
async fn test_validation_runs_to_completion() {
    let gate = Gate::new();
    let script = format!(
        "{}\necho 'Running all validations...'\n{}\n{}\nexit 0",
        PROGRESS_50,
        gate.wait_snippet(),
        VALID_RESULT
    );
    let s = system_stack(&script);

    let job_id = s
        .launcher
        .launch_validation(ValidationOptions::default())
        .await
        .unwrap();
    assert_eq!(job_id, VALIDATION_JOB_ID);

    // While gated: progress visible, lock held, second launch refused
    let job = wait_for(&s.registry, &job_id, |job| !job.events.is_empty()).await;
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.pid.is_some());
    assert!(s.lock.is_locked());
    assert!(running_validation(&s.registry).await.running);
    let err = s
        .launcher
        .launch_validation(ValidationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyRunning { ref job_id } if job_id == VALIDATION_JOB_ID));

    gate.open();
    let job = wait_terminal(&s.registry, &job_id).await;

    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(
        job.events,
        vec![
            JobEvent::Progress(ProgressEvent::new("folder-names", 50, "")),
            JobEvent::Complete {
                result: serde_json::json!({
                    "errors": [], "error_count": 0, "warning_count": 0, "is_valid": true
                })
            },
        ]
    );
    assert!(job.pid.is_none());
    assert!(!s.lock.is_locked());
    assert!(!running_validation(&s.registry).await.running);

    // Lock is free again
    s.launcher
        .launch_validation(ValidationOptions::default())
        .await
        .unwrap();
    wait_terminal(&s.registry, VALIDATION_JOB_ID).await;
}

/// Exit code 1 means findings, not failure
#[tokio::test]
async fn test_exit_one_with_findings_completes() {
    let s = system_stack(
        r#"printf '%s\n' '{"errors": [{"level": "ERROR", "message": "bad gtin"}], "error_count": 1, "warning_count": 0, "is_valid": false}'; exit 1"#,
    );

    let job_id = s
        .launcher
        .launch_validation(ValidationOptions {
            validation_type: ValidationType::Gtin,
        })
        .await
        .unwrap();
    let job = wait_terminal(&s.registry, &job_id).await;

    assert_eq!(job.status, JobStatus::Complete);
    let result = job.result.unwrap();
    assert_eq!(result["is_valid"], false);
    assert_eq!(result["error_count"], 1);
}

/// Any other exit code is an error carrying stderr
#[tokio::test]
async fn test_crash_is_error_with_diagnostic() {
    let s = system_stack(&format!(
        "{}\necho 'Traceback (most recent call last):' >&2\necho 'KeyError: stores' >&2\nexit 2",
        PROGRESS_50
    ));

    let job_id = s
        .launcher
        .launch_sort(SortOptions::default())
        .await
        .unwrap();
    let job = wait_terminal(&s.registry, &job_id).await;

    assert_eq!(job.status, JobStatus::Error);
    assert!(job.result.is_none());
    assert_eq!(job.events.len(), 2);
    match job.events.last() {
        Some(JobEvent::Error {
            message,
            diagnostic,
        }) => {
            assert_eq!(message, "Process exited with code 2");
            let diagnostic = diagnostic.as_deref().unwrap();
            assert!(diagnostic.starts_with("Traceback"));
            assert!(diagnostic.ends_with("KeyError: stores"));
        }
        other => panic!("expected error event, got {:?}", other),
    }
}

/// Missing program fails the job and frees the lock
#[tokio::test]
async fn test_spawn_failure_frees_lock() {
    let s = common::stack_with_command(
        ToolCommand::new("/nonexistent/ofd-python", vec![], None),
        Arc::new(SystemTimeProvider),
        SweepConfig::default(),
    );

    let job_id = s
        .launcher
        .launch_validation(ValidationOptions::default())
        .await
        .unwrap();
    let job = wait_terminal(&s.registry, &job_id).await;

    assert_eq!(job.status, JobStatus::Error);
    assert!(matches!(
        job.events.as_slice(),
        [JobEvent::Error { message, .. }] if message.starts_with("Failed to start process")
    ));
    assert!(!s.lock.is_locked());
}

/// Result printed without a trailing newline is still picked up
#[tokio::test]
async fn test_unterminated_result_line() {
    let s = system_stack(
        r#"printf '%s' '{"success": true, "message": "Sorted", "dry_run": true, "stats": {"files_processed": 4, "files_modified": 1, "files_skipped": 0, "extra_keys_found": 0}}'"#,
    );

    let job_id = s
        .launcher
        .launch_sort(SortOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let job = wait_terminal(&s.registry, &job_id).await;

    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.result.unwrap()["stats"]["files_modified"], 1);
}

/// The tool sees the subcommand argv built from the options
#[tokio::test]
async fn test_sort_argv_reaches_tool() {
    let s = system_stack(r#"printf '{"success": true, "args": "%s"}\n' "$*""#);

    let job_id = s
        .launcher
        .launch_sort(SortOptions {
            dry_run: true,
            validate: true,
            fix_indent_only: false,
        })
        .await
        .unwrap();
    let job = wait_terminal(&s.registry, &job_id).await;

    assert_eq!(
        job.result.unwrap()["args"],
        "script style_data --json --progress --dry-run --validate"
    );
}

/// Sort jobs run side by side with independent ids and events
#[tokio::test]
async fn test_concurrent_sorts() {
    let gate = Gate::new();
    let script = format!(
        r#"printf '%s\n' '{{"type": "progress", "stage": "sorting_data", "percent": 10}}'
{}
printf '%s\n' '{{"success": true, "message": "ok", "dry_run": true, "stats": {{}}}}'"#,
        gate.wait_snippet()
    );
    let s = system_stack(&script);

    let first = s.launcher.launch_sort(SortOptions::default()).await.unwrap();
    let second = s.launcher.launch_sort(SortOptions::default()).await.unwrap();
    assert_ne!(first, second);
    assert!(first.starts_with("sort-") && second.starts_with("sort-"));

    // Both running at once
    wait_for(&s.registry, &first, |job| !job.events.is_empty()).await;
    wait_for(&s.registry, &second, |job| !job.events.is_empty()).await;
    assert_eq!(s.registry.counts().await.running, 2);
    assert!(!s.lock.is_locked());

    gate.open();
    for id in [&first, &second] {
        let job = wait_terminal(&s.registry, id).await;
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.events.len(), 2);
    }
}

/// Late and live observers both receive the full history exactly once
#[tokio::test]
async fn test_observers_replay_full_history() {
    let gate = Gate::new();
    let script = format!(
        r#"for pct in 0 25 50; do printf '{{"type": "progress", "stage": "loading_schemas", "percent": %s}}\n' "$pct"; done
{}
printf '%s\n' '{{"type": "progress", "stage": "done", "percent": 100}}'
{}"#,
        gate.wait_snippet(),
        VALID_RESULT
    );
    let s = system_stack(&script);
    let job_id = s
        .launcher
        .launch_validation(ValidationOptions::default())
        .await
        .unwrap();
    wait_for(&s.registry, &job_id, |job| job.events.len() == 3).await;

    // Attached mid-run
    let mut live = JobObserver::attach(s.registry.clone(), job_id.clone())
        .await
        .unwrap();
    let first = live.next_batch().await.unwrap();
    assert_eq!(first.len(), 3);

    gate.open();
    let mut rest = Vec::new();
    while let Some(batch) = live.next_batch().await {
        rest.extend(batch);
    }
    assert_eq!(rest.len(), 2);
    assert!(rest[1].is_terminal());

    // Attached after completion
    let mut late = JobObserver::attach(s.registry.clone(), job_id).await.unwrap();
    let replay = late.next_batch().await.unwrap();
    assert_eq!(replay.len(), 5);
    assert_eq!([first, rest].concat(), replay);
    assert!(late.next_batch().await.is_none());
}

/// A stuck run is timed out, its process killed and the lock freed
#[tokio::test]
async fn test_sweeper_times_out_stuck_validation() {
    let clock = Arc::new(ManualTimeProvider::new(0));
    let s = stack(
        &format!("{}\nexec sleep 30", PROGRESS_50),
        clock.clone(),
        SweepConfig {
            interval: Duration::from_secs(60),
            retention_ms: 60_000,
            timeout_ms: 10_000,
        },
    );

    let job_id = s
        .launcher
        .launch_validation(ValidationOptions::default())
        .await
        .unwrap();
    let job = wait_for(&s.registry, &job_id, |job| {
        job.pid.is_some() && !job.events.is_empty()
    })
    .await;
    let pid = job.pid.unwrap();

    clock.advance(11_000);
    let stats = s.sweeper.sweep_once().await;
    assert_eq!(stats.timed_out, 1);
    assert!(!s.lock.is_locked());

    let job = s.registry.get(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(matches!(
        job.events.last(),
        Some(JobEvent::Error { message, .. }) if message == "Job timed out after 10s"
    ));

    // Process is gone and its late exit leaves the record alone
    #[cfg(target_os = "linux")]
    assert!(!std::path::Path::new(&format!("/proc/{}", pid)).exists());
    tokio::time::sleep(Duration::from_millis(200)).await;
    let job = s.registry.get(&job_id).await.unwrap();
    assert_eq!(job.events.len(), 2);

    // Retention then evicts it
    clock.advance(61_000);
    assert_eq!(s.sweeper.sweep_once().await.evicted, 1);
    assert!(s.registry.get(&job_id).await.is_none());
}
