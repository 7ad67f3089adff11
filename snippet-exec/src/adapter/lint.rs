use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use super::{ToolCommand, DEFAULT_TOOL_TIMEOUT};
use crate::error::AdapterError;

/// Linters tried in order when none is configured
const CANDIDATES: &[&[&str]] = &[
    &["ruff", "check", "--quiet", "--output-format", "concise", "-"],
    &["flake8", "-"],
    &["pyflakes"],
];

/// Linters exit 1 when they found something
const FINDINGS_EXIT_CODE: i32 = 1;

/// One diagnostic reported by a linter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintFinding {
    pub line: u32,
    pub column: Option<u32>,
    pub message: String,
    pub tool: String,
}

/// Static checks over source text. Advisory only, like formatting.
#[async_trait]
pub trait Linter: Send + Sync {
    fn name(&self) -> &str;

    async fn lint(&self, source: &str) -> Result<Vec<LintFinding>, AdapterError>;
}

/// Linter backed by an external command printing `path:line[:col]: message`
pub struct CommandLinter {
    command: ToolCommand,
    timeout: Duration,
}

impl CommandLinter {
    pub fn new(command: ToolCommand) -> Self {
        Self {
            command,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First known linter installed on this machine
    pub fn detect() -> Option<Self> {
        let found = CANDIDATES.iter().find_map(|argv| {
            let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
            let command = ToolCommand::from_argv(&argv)?;
            command.locate().ok().map(|_| command)
        });
        debug!("Detected linter: {:?}", found);
        found.map(Self::new)
    }
}

#[async_trait]
impl Linter for CommandLinter {
    fn name(&self) -> &str {
        self.command.program()
    }

    async fn lint(&self, source: &str) -> Result<Vec<LintFinding>, AdapterError> {
        let output = self.command.run(source, self.timeout).await?;
        match output.status.code() {
            Some(0) | Some(FINDINGS_EXIT_CODE) => Ok(parse_findings(
                self.name(),
                &String::from_utf8_lossy(&output.stdout),
            )),
            _ => Err(self.command.failure(&output)),
        }
    }
}

fn finding_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^:]*:(\d+):(?:(\d+):)?\s*(.+)$").expect("finding pattern is valid")
    })
}

/// Findings from linter output; lines in any other shape are skipped
pub fn parse_findings(tool: &str, output: &str) -> Vec<LintFinding> {
    output
        .lines()
        .filter_map(|line| {
            let caps = finding_line().captures(line.trim())?;
            Some(LintFinding {
                line: caps[1].parse().ok()?,
                column: caps.get(2).and_then(|col| col.as_str().parse().ok()),
                message: caps[3].trim().to_string(),
                tool: tool.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ruff_and_pyflakes_lines() {
        let output = "-:1:8: F401 [*] `os` imported but unused\n<stdin>:3: undefined name 'y'\nFound 2 errors.\n";
        let findings = parse_findings("ruff", output);

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].line, 1);
        assert_eq!(findings[0].column, Some(8));
        assert_eq!(findings[0].message, "F401 [*] `os` imported but unused");
        assert_eq!(findings[1].line, 3);
        assert_eq!(findings[1].column, None);
        assert_eq!(findings[1].tool, "ruff");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_findings_exit_code_is_not_a_failure() {
        let script = "cat >/dev/null; echo '-:2:1: F821 undefined name x'; exit 1";
        let linter = CommandLinter::new(ToolCommand::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
        ));

        let findings = linter.lint("print(x)\n").await.unwrap();
        assert_eq!(
            findings,
            vec![LintFinding {
                line: 2,
                column: Some(1),
                message: "F821 undefined name x".to_string(),
                tool: "sh".to_string(),
            }]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_source_has_no_findings() {
        let linter = CommandLinter::new(ToolCommand::new("true", vec![]));
        assert!(linter.lint("x = 1\n").await.unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_linter_crash_is_a_failure() {
        let linter = CommandLinter::new(ToolCommand::new(
            "sh",
            vec!["-c".to_string(), "exit 2".to_string()],
        ));
        let result = linter.lint("x = 1\n").await;
        assert!(matches!(result, Err(AdapterError::Failed(_))));
    }

    #[tokio::test]
    async fn test_missing_linter() {
        let linter = CommandLinter::new(ToolCommand::new("no-such-linter-5521", vec![]));
        let result = linter.lint("x = 1\n").await;
        assert!(matches!(result, Err(AdapterError::Unavailable(_))));
    }
}
