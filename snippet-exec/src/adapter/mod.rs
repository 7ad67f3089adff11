//! Optional external collaborators: formatting, linting and text completion.
//!
//! All are plain commands that read text on stdin and answer on stdout.
//! The execution core never depends on them being present.

mod complete;
mod format;
mod lint;

pub use complete::{extract_code, repair_prompt, CommandCompleter, Completer};
pub use format::{CommandFormatter, Formatter};
pub use lint::{parse_findings, CommandLinter, LintFinding, Linter};

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::{io::AsyncWriteExt, process::Command, time};
use tracing::debug;
use which::which;

use crate::error::AdapterError;

/// Per-call ceiling for external tools
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(45);

/// Program plus arguments of an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Whitespace-separated command line, no shell quoting
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn locate(&self) -> Result<PathBuf, AdapterError> {
        which(&self.program).map_err(|_| AdapterError::Unavailable(self.program.clone()))
    }

    /// Feed `input` on stdin, return stdout. Non-zero exit is a failure.
    pub async fn pipe(&self, input: &str, timeout: Duration) -> Result<String, AdapterError> {
        let output = self.run(input, timeout).await?;
        if !output.status.success() {
            return Err(self.failure(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub(crate) fn failure(&self, output: &Output) -> AdapterError {
        AdapterError::Failed(format!(
            "{} exited with {}: {}",
            self.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }

    /// Feed `input` on stdin and collect everything, whatever the exit status
    pub(crate) async fn run(&self, input: &str, timeout: Duration) -> Result<Output, AdapterError> {
        let program = self.locate()?;
        debug!("Running tool {} {:?}", program.display(), self.args);

        let mut child = Command::new(&program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = input.to_owned();
            tokio::spawn(async move {
                let _ = stdin.write_all(input.as_bytes()).await;
                let _ = stdin.shutdown().await;
            });
        }

        let output = time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| AdapterError::Timeout(timeout))??;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let command = ToolCommand::parse("ruff format -").unwrap();
        assert_eq!(command.program(), "ruff");
        assert_eq!(command.args, vec!["format", "-"]);
        assert!(ToolCommand::parse("   ").is_none());
    }

    #[test]
    fn test_from_argv() {
        let argv = vec!["black".to_string(), "-q".to_string(), "-".to_string()];
        let command = ToolCommand::from_argv(&argv).unwrap();
        assert_eq!(command.program(), "black");
        assert!(ToolCommand::from_argv(&[]).is_none());
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        let command = ToolCommand::new("no-such-tool-9931", vec![]);
        let result = tokio_test::block_on(command.pipe("x", DEFAULT_TOOL_TIMEOUT));
        assert!(matches!(result, Err(AdapterError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pipe_round_trips_through_cat() {
        let command = ToolCommand::new("cat", vec![]);
        let output = command.pipe("x = 1\n", DEFAULT_TOOL_TIMEOUT).await.unwrap();
        assert_eq!(output, "x = 1\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_is_reported() {
        let command = ToolCommand::new("false", vec![]);
        let result = command.pipe("", DEFAULT_TOOL_TIMEOUT).await;
        assert!(matches!(result, Err(AdapterError::Failed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_tool_times_out() {
        let command = ToolCommand::new("sleep", vec!["5".to_string()]);
        let error = command
            .pipe("", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(error, AdapterError::Timeout(_)));
        assert_eq!(error.to_string(), "Tool timed out after 0.100s");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_keeps_output_of_failing_tool() {
        let command = ToolCommand::new(
            "sh",
            vec!["-c".to_string(), "cat; exit 1".to_string()],
        );
        let output = command.run("kept\n", DEFAULT_TOOL_TIMEOUT).await.unwrap();
        assert_eq!(output.status.code(), Some(1));
        assert_eq!(output.stdout, b"kept\n");
    }
}
