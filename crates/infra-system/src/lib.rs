// ofd-jobs Infrastructure - System Adapters
// Implements: TaskExecutor

pub mod subprocess_executor;

pub use subprocess_executor::SubprocessExecutor;
