use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Where the snippet text came from. Only used for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnippetOrigin {
    Literal,
    File(PathBuf),
    Stdin,
}

impl fmt::Display for SnippetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnippetOrigin::Literal => f.write_str("argument"),
            SnippetOrigin::File(path) => write!(f, "file {}", path.display()),
            SnippetOrigin::Stdin => f.write_str("stdin"),
        }
    }
}

/// Source text to execute as a standalone program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    source: String,
    origin: SnippetOrigin,
}

impl Snippet {
    pub fn new(source: impl Into<String>, origin: SnippetOrigin) -> Self {
        Self {
            source: source.into(),
            origin,
        }
    }

    pub fn literal(source: impl Into<String>) -> Self {
        Self::new(source, SnippetOrigin::Literal)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> &SnippetOrigin {
        &self.origin
    }
}

/// CPU, memory and wall-clock bounds for one execution.
///
/// The CPU and wall-clock limits are independent: either may end the run
/// first. Values are validated on construction and cannot change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimitProfile {
    cpu_time: Duration,
    memory_mb: u64,
    wall_timeout: Duration,
    max_file_size_bytes: u64,
    max_open_files: u64,
}

impl ResourceLimitProfile {
    pub const DEFAULT_CPU_SECONDS: u64 = 5;
    pub const DEFAULT_MEMORY_MB: u64 = 128;
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;
    pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 16 * 1024 * 1024;
    pub const DEFAULT_MAX_OPEN_FILES: u64 = 256;

    pub fn new(cpu_time: Duration, memory_mb: u64, wall_timeout: Duration) -> Result<Self, Error> {
        if cpu_time.is_zero() {
            return Err(Error::InvalidProfile(
                "CPU time limit must be positive".to_string(),
            ));
        }
        if memory_mb == 0 {
            return Err(Error::InvalidProfile(
                "Memory limit must be positive".to_string(),
            ));
        }
        if wall_timeout.is_zero() {
            return Err(Error::InvalidProfile(
                "Wall-clock timeout must be positive".to_string(),
            ));
        }

        Ok(Self {
            cpu_time,
            memory_mb,
            wall_timeout,
            max_file_size_bytes: Self::DEFAULT_MAX_FILE_SIZE_BYTES,
            max_open_files: Self::DEFAULT_MAX_OPEN_FILES,
        })
    }

    /// Ceiling on the size of any file the snippet writes
    pub fn with_max_file_size(mut self, bytes: u64) -> Result<Self, Error> {
        if bytes == 0 {
            return Err(Error::InvalidProfile(
                "File size limit must be positive".to_string(),
            ));
        }
        self.max_file_size_bytes = bytes;
        Ok(self)
    }

    /// Ceiling on open file descriptors. Never raises the inherited soft limit.
    pub fn with_max_open_files(mut self, count: u64) -> Result<Self, Error> {
        if count == 0 {
            return Err(Error::InvalidProfile(
                "Open files limit must be positive".to_string(),
            ));
        }
        self.max_open_files = count;
        Ok(self)
    }

    pub fn cpu_time(&self) -> Duration {
        self.cpu_time
    }

    /// CPU ceiling as whole seconds, rounded up, at least one
    pub fn cpu_seconds(&self) -> u64 {
        let secs = self.cpu_time.as_secs();
        let secs = if self.cpu_time.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        secs.max(1)
    }

    pub fn memory_mb(&self) -> u64 {
        self.memory_mb
    }

    pub fn memory_bytes(&self) -> u64 {
        self.memory_mb.saturating_mul(1024 * 1024)
    }

    pub fn wall_timeout(&self) -> Duration {
        self.wall_timeout
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    pub fn max_open_files(&self) -> u64 {
        self.max_open_files
    }
}

impl Default for ResourceLimitProfile {
    fn default() -> Self {
        Self {
            cpu_time: Duration::from_secs(Self::DEFAULT_CPU_SECONDS),
            memory_mb: Self::DEFAULT_MEMORY_MB,
            wall_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECONDS),
            max_file_size_bytes: Self::DEFAULT_MAX_FILE_SIZE_BYTES,
            max_open_files: Self::DEFAULT_MAX_OPEN_FILES,
        }
    }
}

/// How the outcome is presented to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Human,
    Json,
}

/// Snippet execution request
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Source to run
    pub snippet: Snippet,
    /// Bytes delivered on the snippet's stdin; stdin is closed when absent
    pub stdin: Option<Vec<u8>>,
    /// Limits applied to the launched process
    pub profile: ResourceLimitProfile,
    /// Interpreter override; resolved from PATH when absent
    pub interpreter: Option<PathBuf>,
    pub output_mode: OutputMode,
}

impl ExecutionRequest {
    pub fn new(snippet: Snippet) -> Self {
        Self {
            snippet,
            stdin: None,
            profile: ResourceLimitProfile::default(),
            interpreter: None,
            output_mode: OutputMode::default(),
        }
    }

    pub fn with_stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    pub fn with_profile(mut self, profile: ResourceLimitProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(path.into());
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }
}

/// How the child process ended, as reported by the operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Returned through its own exit path with this code
    Exited(i32),
    /// Killed by this signal
    Signaled(i32),
}

impl ExitStatus {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            ExitStatus::Signaled(_) => None,
        }
    }

    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(_) => None,
            ExitStatus::Signaled(signal) => Some(*signal),
        }
    }

    /// Single signed value: the exit code, or the negated signal number
    pub fn as_signed(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Signaled(signal) => -signal,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signaled(signal);
            }
        }
        ExitStatus::Exited(status.code().unwrap_or(-1))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "{}", code),
            ExitStatus::Signaled(signal) => write!(f, "signal {}", signal),
        }
    }
}

/// Classified cause of the end of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    CompletedNormally,
    TimedOut,
    ResourceLimitExceeded,
    LaunchFailed,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::CompletedNormally => "completedNormally",
            TerminationReason::TimedOut => "timedOut",
            TerminationReason::ResourceLimitExceeded => "resourceLimitExceeded",
            TerminationReason::LaunchFailed => "launchFailed",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A limit the current platform could not apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    CpuTime,
    Memory,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::CpuTime => f.write_str("cpu_time"),
            LimitKind::Memory => f.write_str("memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = ResourceLimitProfile::default();
        assert_eq!(profile.cpu_time(), Duration::from_secs(5));
        assert_eq!(profile.memory_mb(), 128);
        assert_eq!(profile.memory_bytes(), 128 * 1024 * 1024);
        assert_eq!(profile.wall_timeout(), Duration::from_secs(5));
        assert_eq!(profile.max_open_files(), 256);
    }

    #[test]
    fn test_profile_rejects_zero_values() {
        assert!(matches!(
            ResourceLimitProfile::new(Duration::ZERO, 128, Duration::from_secs(1)),
            Err(Error::InvalidProfile(_))
        ));
        assert!(matches!(
            ResourceLimitProfile::new(Duration::from_secs(1), 0, Duration::from_secs(1)),
            Err(Error::InvalidProfile(_))
        ));
        assert!(matches!(
            ResourceLimitProfile::new(Duration::from_secs(1), 128, Duration::ZERO),
            Err(Error::InvalidProfile(_))
        ));
        assert!(ResourceLimitProfile::default().with_max_open_files(0).is_err());
    }

    #[test]
    fn test_wall_timeout_may_be_shorter_than_cpu() {
        let profile =
            ResourceLimitProfile::new(Duration::from_secs(5), 64, Duration::from_secs(1)).unwrap();
        assert!(profile.wall_timeout() < profile.cpu_time());
    }

    #[test]
    fn test_cpu_seconds_rounds_up() {
        let profile =
            ResourceLimitProfile::new(Duration::from_millis(1500), 64, Duration::from_secs(1))
                .unwrap();
        assert_eq!(profile.cpu_seconds(), 2);

        let profile =
            ResourceLimitProfile::new(Duration::from_millis(10), 64, Duration::from_secs(1))
                .unwrap();
        assert_eq!(profile.cpu_seconds(), 1);
    }

    #[test]
    fn test_exit_status_signed_value() {
        assert_eq!(ExitStatus::Exited(3).as_signed(), 3);
        assert_eq!(ExitStatus::Signaled(9).as_signed(), -9);
        assert_eq!(ExitStatus::Signaled(9).to_string(), "signal 9");
    }

    #[test]
    fn test_termination_reason_serde() {
        let json = serde_json::to_string(&TerminationReason::ResourceLimitExceeded).unwrap();
        assert_eq!(json, "\"resourceLimitExceeded\"");
        let reason: TerminationReason = serde_json::from_str("\"timedOut\"").unwrap();
        assert_eq!(reason, TerminationReason::TimedOut);
    }
}
