//! Execution outcome and its two renderings

use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;

use crate::{
    adapter::LintFinding,
    diagnose::{self, ErrorSummary},
    types::{ExitStatus, LimitKind, OutputMode, TerminationReason},
};

/// Immutable record of one execution.
///
/// Produced once by the supervisor after the child has exited or been killed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    stdout: Option<String>,
    stderr: Option<String>,
    exit_status: Option<ExitStatus>,
    elapsed: Duration,
    termination_reason: TerminationReason,
    launch_error: Option<String>,
    unenforced_limits: Vec<LimitKind>,
}

impl ExecutionOutcome {
    pub(crate) fn finished(
        stdout: String,
        stderr: String,
        exit_status: ExitStatus,
        elapsed: Duration,
        termination_reason: TerminationReason,
        unenforced_limits: Vec<LimitKind>,
    ) -> Self {
        Self {
            stdout: Some(stdout),
            stderr: Some(stderr),
            exit_status: Some(exit_status),
            elapsed,
            termination_reason,
            launch_error: None,
            unenforced_limits,
        }
    }

    pub(crate) fn launch_failed(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            stdout: None,
            stderr: None,
            exit_status: None,
            elapsed,
            termination_reason: TerminationReason::LaunchFailed,
            launch_error: Some(error.into()),
            unenforced_limits: Vec::new(),
        }
    }

    /// The interpreter could not even be exec'd inside the limits
    pub(crate) fn rejected_by_limits(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            stdout: Some(String::new()),
            stderr: Some(String::new()),
            exit_status: None,
            elapsed,
            termination_reason: TerminationReason::ResourceLimitExceeded,
            launch_error: Some(error.into()),
            unenforced_limits: Vec::new(),
        }
    }

    /// `None` only when the process never started
    pub fn stdout(&self) -> Option<&str> {
        self.stdout.as_deref()
    }

    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn termination_reason(&self) -> TerminationReason {
        self.termination_reason
    }

    pub fn launch_error(&self) -> Option<&str> {
        self.launch_error.as_deref()
    }

    pub fn unenforced_limits(&self) -> &[LimitKind] {
        &self.unenforced_limits
    }

    /// Ran to completion and returned exit status 0
    pub fn is_success(&self) -> bool {
        self.termination_reason == TerminationReason::CompletedNormally
            && self.exit_status == Some(ExitStatus::Exited(0))
    }

    pub fn render(&self, mode: OutputMode, out: &mut impl Write) -> io::Result<()> {
        Report::new(self).render(mode, out)
    }
}

/// An outcome plus the optional adapter output shown next to it
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    outcome: &'a ExecutionOutcome,
    formatted_source: Option<&'a str>,
    repaired_source: Option<&'a str>,
    lint_findings: Option<&'a [LintFinding]>,
}

#[derive(Serialize)]
struct OutcomeDocument<'a> {
    stdout: Option<&'a str>,
    stderr: Option<&'a str>,
    exit_status: Option<i32>,
    signal: Option<i32>,
    elapsed_seconds: f64,
    termination_reason: TerminationReason,
    launch_error: Option<&'a str>,
    unenforced_limits: &'a [LimitKind],
    error_type: Option<String>,
    error_message: Option<String>,
    formatted_source: Option<&'a str>,
    repaired_source: Option<&'a str>,
    lint_findings: Option<&'a [LintFinding]>,
}

impl<'a> Report<'a> {
    pub fn new(outcome: &'a ExecutionOutcome) -> Self {
        Self {
            outcome,
            formatted_source: None,
            repaired_source: None,
            lint_findings: None,
        }
    }

    pub fn with_formatted_source(mut self, source: Option<&'a str>) -> Self {
        self.formatted_source = source;
        self
    }

    pub fn with_repaired_source(mut self, source: Option<&'a str>) -> Self {
        self.repaired_source = source;
        self
    }

    /// `None` when linting was not requested or the linter was unusable
    pub fn with_lint_findings(mut self, findings: Option<&'a [LintFinding]>) -> Self {
        self.lint_findings = findings;
        self
    }

    pub fn render(&self, mode: OutputMode, out: &mut impl Write) -> io::Result<()> {
        match mode {
            OutputMode::Human => self.render_human(out),
            OutputMode::Json => self.render_json(out),
        }
    }

    /// Single JSON document; every field is present, null when not applicable
    pub fn to_json(&self) -> serde_json::Value {
        let outcome = self.outcome;
        let summary = ErrorSummary::for_outcome(outcome);
        let (error_type, error_message) = match summary {
            Some(summary) => (Some(summary.error_type), Some(summary.message)),
            None => (None, None),
        };

        let document = OutcomeDocument {
            stdout: outcome.stdout(),
            stderr: outcome.stderr(),
            exit_status: outcome.exit_status().map(|status| status.as_signed()),
            signal: outcome.exit_status().and_then(|status| status.signal()),
            elapsed_seconds: outcome.elapsed().as_secs_f64(),
            termination_reason: outcome.termination_reason(),
            launch_error: outcome.launch_error(),
            unenforced_limits: outcome.unenforced_limits(),
            error_type,
            error_message,
            formatted_source: self.formatted_source,
            repaired_source: self.repaired_source,
            lint_findings: self.lint_findings,
        };

        // Plain structs of strings and numbers always serialize.
        serde_json::to_value(document).unwrap_or(serde_json::Value::Null)
    }

    fn render_json(&self, out: &mut impl Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, &self.to_json())?;
        writeln!(out)
    }

    fn render_human(&self, out: &mut impl Write) -> io::Result<()> {
        let outcome = self.outcome;

        if let Some(stdout) = outcome.stdout().filter(|s| !s.is_empty()) {
            write_block(out, stdout)?;
        }
        if let Some(stderr) = outcome.stderr().filter(|s| !s.is_empty()) {
            writeln!(out, "--- stderr ---")?;
            write_block(out, stderr)?;
        }

        match outcome.launch_error() {
            Some(error) => writeln!(
                out,
                "[{}] {}, elapsed: {:.3}s",
                outcome.termination_reason(),
                error,
                outcome.elapsed().as_secs_f64()
            )?,
            None => writeln!(
                out,
                "[{}] exit status: {}, elapsed: {:.3}s",
                outcome.termination_reason(),
                outcome
                    .exit_status()
                    .map(|status| status.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                outcome.elapsed().as_secs_f64()
            )?,
        }

        if !outcome.unenforced_limits().is_empty() {
            let kinds: Vec<String> = outcome
                .unenforced_limits()
                .iter()
                .map(|kind| kind.to_string())
                .collect();
            writeln!(
                out,
                "warning: limits not enforced on this platform: {}",
                kinds.join(", ")
            )?;
        }

        if let Some(suggestion) = diagnose::suggestion(outcome) {
            writeln!(out, "\n--- diagnosis ---")?;
            write_block(out, &suggestion)?;
        }
        if let Some(formatted) = self.formatted_source {
            writeln!(out, "\n--- formatted source ---")?;
            write_block(out, formatted)?;
        }
        if let Some(findings) = self.lint_findings {
            writeln!(out, "\n--- lint ---")?;
            if findings.is_empty() {
                writeln!(out, "no findings")?;
            }
            for finding in findings {
                match finding.column {
                    Some(column) => writeln!(
                        out,
                        "line {}:{}: {} ({})",
                        finding.line, column, finding.message, finding.tool
                    )?,
                    None => writeln!(
                        out,
                        "line {}: {} ({})",
                        finding.line, finding.message, finding.tool
                    )?,
                }
            }
        }
        if let Some(repaired) = self.repaired_source {
            writeln!(out, "\n--- suggested fix ---")?;
            write_block(out, repaired)?;
        }

        Ok(())
    }
}

fn write_block(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}
