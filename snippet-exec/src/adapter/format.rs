use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{ToolCommand, DEFAULT_TOOL_TIMEOUT};
use crate::error::AdapterError;

/// Formatters tried in order when none is configured
const CANDIDATES: &[&[&str]] = &[
    &["ruff", "format", "-"],
    &["black", "-q", "-"],
    &["autopep8", "-"],
];

/// Rewrites source text. Advisory only, never required to run a snippet.
#[async_trait]
pub trait Formatter: Send + Sync {
    fn name(&self) -> &str;

    async fn format(&self, source: &str) -> Result<String, AdapterError>;
}

/// Formatter backed by an external stdin-to-stdout command
pub struct CommandFormatter {
    command: ToolCommand,
    timeout: Duration,
}

impl CommandFormatter {
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

    /// First known formatter installed on this machine
    pub fn detect() -> Option<Self> {
        let found = CANDIDATES.iter().find_map(|argv| {
            let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
            let command = ToolCommand::from_argv(&argv)?;
            command.locate().ok().map(|_| command)
        });
        debug!("Detected formatter: {:?}", found);
        found.map(Self::new)
    }
}

#[async_trait]
impl Formatter for CommandFormatter {
    fn name(&self) -> &str {
        self.command.program()
    }

    async fn format(&self, source: &str) -> Result<String, AdapterError> {
        let formatted = self.command.pipe(source, self.timeout).await?;
        if formatted.trim().is_empty() && !source.trim().is_empty() {
            return Err(AdapterError::Failed(format!(
                "{} produced no output",
                self.command.program()
            )));
        }
        Ok(formatted)
    }
}
