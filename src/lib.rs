//! Command-line front end for `snippet-exec`.
//!
//! Reads a snippet, runs it once under the configured limits and prints the
//! outcome. The process exit code reflects how the run ended, never the
//! snippet's own exit status.

pub mod cli;
pub mod config;

use anyhow::{bail, Context};
use snippet_exec::{
    adapter::{CommandCompleter, CommandFormatter, CommandLinter, Formatter, LintFinding},
    ExecutionOutcome, ExecutionRequest, OutputMode, Report, Snippet, SnippetExecutionService,
    SnippetOrigin, TerminationReason,
};
use std::io::Write;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

pub use cli::Cli;
use config::Settings;

pub const EXIT_TIMED_OUT: u8 = 124;
pub const EXIT_RESOURCE_LIMIT: u8 = 125;
pub const EXIT_LAUNCH_FAILED: u8 = 127;

pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    }
    .merge(cli.overrides());

    let snippet = read_snippet(&cli).await?;
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let mut request = ExecutionRequest::new(snippet)
        .with_profile(settings.profile()?)
        .with_output_mode(mode);
    if let Some(data) = &cli.stdin_data {
        request = request.with_stdin(data.as_bytes());
    }
    if let Some(path) = &settings.interpreter.path {
        request = request.with_interpreter(path);
    }

    let service = SnippetExecutionService::new().with_launcher(settings.launcher());

    // Adapter commands are settled before the run so a bad one cannot cost
    // the outcome.
    let formatter = cli.format.then(|| formatter(&settings)).flatten();
    let linter = cli.lint.then(|| linter(&settings)).flatten();
    let completer = cli.repair.then(|| completer(&settings)).flatten();

    let lint = async {
        match &linter {
            Some(linter) => service.lint(&request, linter).await,
            None => None,
        }
    };
    let (executed, findings) = tokio::join!(
        service.execute_with_formatter(&request, formatter.as_ref().map(|f| f as &dyn Formatter)),
        lint
    );
    let (outcome, formatted) = executed?;

    let repaired = match &completer {
        Some(completer) => service.suggest_repair(&request, &outcome, completer).await,
        None => None,
    };

    print_report(
        &outcome,
        mode,
        formatted.as_deref(),
        findings.as_deref(),
        repaired.as_deref(),
    )?;
    Ok(ExitCode::from(exit_code(outcome.termination_reason())))
}

/// Process exit code for each way a run can end
pub fn exit_code(reason: TerminationReason) -> u8 {
    match reason {
        TerminationReason::CompletedNormally => 0,
        TerminationReason::TimedOut => EXIT_TIMED_OUT,
        TerminationReason::ResourceLimitExceeded => EXIT_RESOURCE_LIMIT,
        TerminationReason::LaunchFailed => EXIT_LAUNCH_FAILED,
    }
}

async fn read_snippet(cli: &Cli) -> anyhow::Result<Snippet> {
    if let Some(code) = &cli.code {
        return Ok(Snippet::literal(code.as_str()));
    }

    if let Some(path) = &cli.file {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snippet file {}", path.display()))?;
        return Ok(Snippet::new(source, SnippetOrigin::File(path.clone())));
    }

    let mut source = String::new();
    tokio::io::stdin()
        .read_to_string(&mut source)
        .await
        .context("Failed to read snippet from stdin")?;
    if source.trim().is_empty() {
        bail!("No snippet given: pass CODE, use --file, or pipe the source on stdin");
    }
    Ok(Snippet::new(source, SnippetOrigin::Stdin))
}

fn formatter(settings: &Settings) -> Option<CommandFormatter> {
    let formatter = match settings.formatter_command() {
        Ok(Some(command)) => Some(CommandFormatter::new(command)),
        Ok(None) => CommandFormatter::detect(),
        Err(e) => {
            warn!("{}, skipping formatting", e);
            return None;
        }
    };
    if formatter.is_none() {
        debug!("No formatter installed, skipping formatting");
    }
    formatter
}

fn linter(settings: &Settings) -> Option<CommandLinter> {
    let linter = match settings.linter_command() {
        Ok(Some(command)) => Some(CommandLinter::new(command)),
        Ok(None) => CommandLinter::detect(),
        Err(e) => {
            warn!("{}, skipping lint", e);
            return None;
        }
    };
    if linter.is_none() {
        debug!("No linter installed, skipping lint");
    }
    linter
}

fn completer(settings: &Settings) -> Option<CommandCompleter> {
    match settings.completer_command() {
        Ok(Some(command)) => Some(CommandCompleter::new(command)),
        Ok(None) => {
            warn!("--repair needs a completer command (--completer-cmd or OFFLINE_LLM_CMD)");
            None
        }
        Err(e) => {
            warn!("{}, skipping repair", e);
            None
        }
    }
}

fn print_report(
    outcome: &ExecutionOutcome,
    mode: OutputMode,
    formatted: Option<&str>,
    findings: Option<&[LintFinding]>,
    repaired: Option<&str>,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    Report::new(outcome)
        .with_formatted_source(formatted)
        .with_lint_findings(findings)
        .with_repaired_source(repaired)
        .render(mode, &mut stdout)
        .context("Failed to write report")?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            exit_code(TerminationReason::CompletedNormally),
            exit_code(TerminationReason::TimedOut),
            exit_code(TerminationReason::ResourceLimitExceeded),
            exit_code(TerminationReason::LaunchFailed),
        ];
        assert_eq!(codes, [0, 124, 125, 127]);
    }
}
