use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid resource profile: {0}")]
    InvalidProfile(String),

    #[error("Failed to launch interpreter: {0}")]
    Launch(String),

    #[error("Memory ceiling too low to start the interpreter: {0}")]
    LimitAtLaunch(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Supervision failed: {0}")]
    Supervision(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the optional external collaborators (formatter, completer).
///
/// Kept apart from [`Error`] so an adapter problem can never surface as an
/// execution failure.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Tool not available: {0}")]
    Unavailable(String),

    #[error("Tool failed: {0}")]
    Failed(String),

    #[error("Tool timed out after {:.3}s", .0.as_secs_f64())]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
