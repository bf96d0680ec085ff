// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod task_executor;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use task_executor::{
    CommandSpec, ExecutionError, ExitReport, ProcessOutput, SpawnedProcess, TaskExecutor,
};
pub use time_provider::TimeProvider;
