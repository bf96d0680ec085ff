// Job engine constants (no magic values)
use std::time::Duration;

/// How often the sweeper runs (1 minute)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long a terminal job stays observable (5 minutes)
pub const DEFAULT_RETENTION_MS: i64 = 5 * 60 * 1000;

/// Hard ceiling for a running job before it is forced to error (30 minutes)
pub const DEFAULT_JOB_TIMEOUT_MS: i64 = 30 * 60 * 1000;

/// Fallback poll for progress observers (100ms)
/// Observers are normally woken by the per-job change notification.
pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Graceful process shutdown timeout before SIGKILL (5 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: i64 = 5000;

/// Default subordinate program and leading arguments
pub const DEFAULT_PROGRAM: &str = "python3";
pub const DEFAULT_PROGRAM_ARGS: [&str; 2] = ["-m", "ofd"];

/// Prefix for freshly generated sort job ids
pub const SORT_JOB_ID_PREFIX: &str = "sort-";
