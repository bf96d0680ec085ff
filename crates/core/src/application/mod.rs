// Application Layer - Job orchestration services

pub mod command;
pub mod constants;
pub mod launcher;
pub mod lock;
pub mod progress;
pub mod registry;
pub mod shutdown;
pub mod status;
pub mod sweeper;

// Re-exports
pub use command::ToolCommand;
pub use launcher::JobLauncher;
pub use lock::{LockToken, ValidationLock, ValidationPermit};
pub use progress::JobObserver;
pub use registry::{JobCounts, JobRegistry};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use status::{running_validation, ValidationStatus};
pub use sweeper::{JobSweeper, SweepConfig, SweepStats};
