// Domain Layer - Pure business logic and entities

pub mod error;
pub mod event;
pub mod job;
pub mod options;
pub mod output;

// Re-exports
pub use error::DomainError;
pub use event::{JobEvent, ProgressEvent};
pub use job::{Job, JobId, JobKind, JobStatus, Timestamp, VALIDATION_JOB_ID};
pub use options::{SortOptions, ValidationOptions, ValidationType};
pub use output::{classify_line, LineSplitter, OutputLine, OutputParser};
