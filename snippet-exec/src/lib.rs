//! # Snippet Execution
//!
//! Runs a fragment of source code in a separate interpreter process under CPU,
//! memory and wall-clock limits, and reports what happened as an immutable
//! [`ExecutionOutcome`] that renders to text or JSON.

pub mod adapter;
pub mod diagnose;
mod error;
pub mod interpreter;
mod launcher;
pub mod limits;
mod outcome;
mod service;
pub mod supervisor;
mod types;

#[cfg(test)]
mod tests;

pub use error::{AdapterError, Error};
pub use launcher::{LaunchedProcess, Launcher, Workspace};
pub use outcome::{ExecutionOutcome, Report};
pub use service::SnippetExecutionService;
pub use supervisor::Supervisor;
pub use types::{
    ExecutionRequest, ExitStatus, LimitKind, OutputMode, ResourceLimitProfile, Snippet,
    SnippetOrigin, TerminationReason,
};

/// Result type for snippet execution operations
pub type Result<T> = std::result::Result<T, Error>;
