use async_trait::async_trait;
use std::time::Duration;

use super::{ToolCommand, DEFAULT_TOOL_TIMEOUT};
use crate::{diagnose::ErrorSummary, error::AdapterError};

/// Turns a prompt into text, typically through a local language model
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AdapterError>;
}

/// Completer that pipes the prompt through a user-supplied command
pub struct CommandCompleter {
    command: ToolCommand,
    timeout: Duration,
}

impl CommandCompleter {
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
}

#[async_trait]
impl Completer for CommandCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, AdapterError> {
        self.command.pipe(prompt, self.timeout).await
    }
}

/// Prompt asking for a corrected version of a failing snippet
pub fn repair_prompt(source: &str, summary: Option<&ErrorSummary>) -> String {
    let mut prompt =
        String::from("Fix the following Python code so it runs without errors. Output ONLY code.\n\n");
    if let Some(summary) = summary {
        prompt.push_str(&format!(
            "The code failed with {}: {}\n\n",
            summary.error_type, summary.message
        ));
    }
    prompt.push_str(source);
    prompt
}

/// Code from a completion: the first fenced block if any, else the whole
/// text. Trailing whitespace is normalized to one newline.
pub fn extract_code(completion: &str) -> String {
    let body = match completion.find("```") {
        Some(open) => {
            let after_fence = &completion[open + 3..];
            // Skip the language tag on the opening fence line.
            let start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
            let block = &after_fence[start..];
            match block.find("```") {
                Some(close) => &block[..close],
                None => block,
            }
        }
        None => completion,
    };
    format!("{}\n", body.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_fenced_code() {
        let completion = "Here you go:\n```python\nprint('ok')\n```\nDone.";
        assert_eq!(extract_code(completion), "print('ok')\n");
    }

    #[test]
    fn test_extract_plain_code() {
        assert_eq!(extract_code("x = 1\n\n\n"), "x = 1\n");
    }

    #[test]
    fn test_extract_unclosed_fence() {
        assert_eq!(extract_code("```\ny = 2\n"), "y = 2\n");
    }

    #[test]
    fn test_repair_prompt_mentions_error() {
        let summary = ErrorSummary {
            error_type: "NameError".to_string(),
            message: "name 'x' is not defined".to_string(),
        };
        let prompt = repair_prompt("print(x)", Some(&summary));
        assert!(prompt.contains("NameError: name 'x' is not defined"));
        assert!(prompt.ends_with("print(x)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_completer_echoes() {
        let completer = CommandCompleter::new(ToolCommand::new("cat", vec![]));
        assert_eq!(completer.complete("hello").await.unwrap(), "hello");
    }
}
