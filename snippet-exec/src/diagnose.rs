//! Error extraction and fix hints for failed runs

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::outcome::ExecutionOutcome;
use crate::types::TerminationReason;

const REFERENCE: &str =
    "For more details, see the Python docs: https://docs.python.org/3/reference/index.html";

fn error_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][\w.]*):\s*(.*)$").expect("error line pattern is valid")
    })
}

const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

/// Failures of the interpreter itself before any snippet code ran
fn startup_memory_failure() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^Fatal Python error: .*(?i:memory allocation failed|MemoryError)|error while loading shared libraries: .*failed to map segment",
        )
        .expect("startup failure pattern is valid")
    })
}

/// Whether stderr shows the process ran out of address space.
///
/// Either the traceback ends in `MemoryError`, or the interpreter died at
/// startup with no traceback at all. Text the snippet printed elsewhere does
/// not count.
pub fn mentions_memory_exhaustion(stderr: &str) -> bool {
    if stderr.contains(TRACEBACK_HEADER) {
        let last = stderr.lines().rev().map(str::trim).find(|line| !line.is_empty());
        return matches!(last, Some(line) if line == "MemoryError" || line.starts_with("MemoryError:"));
    }
    startup_memory_failure().is_match(stderr)
}

/// Error type and message of a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSummary {
    pub error_type: String,
    pub message: String,
}

impl ErrorSummary {
    fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Last `Name: message` line of a traceback
    pub fn from_stderr(stderr: &str) -> Option<Self> {
        stderr
            .trim()
            .lines()
            .rev()
            .find_map(|line| error_line().captures(line.trim()))
            .map(|caps| Self::new(&caps[1], &caps[2]))
    }

    /// `None` when the run completed with exit status 0
    pub fn for_outcome(outcome: &ExecutionOutcome) -> Option<Self> {
        let stderr = outcome.stderr().unwrap_or_default();
        let status = outcome
            .exit_status()
            .map(|status| status.to_string())
            .unwrap_or_else(|| "none".to_string());

        match outcome.termination_reason() {
            TerminationReason::CompletedNormally if outcome.is_success() => None,
            TerminationReason::CompletedNormally => Some(
                Self::from_stderr(stderr)
                    .unwrap_or_else(|| Self::new("NonZeroExit", format!("exit status {}", status))),
            ),
            TerminationReason::TimedOut => Some(Self::new(
                "TimeoutExpired",
                format!(
                    "terminated after {:.3}s of wall-clock time",
                    outcome.elapsed().as_secs_f64()
                ),
            )),
            TerminationReason::ResourceLimitExceeded => {
                Some(Self::from_stderr(stderr).unwrap_or_else(|| {
                    Self::new(
                        "ResourceLimitExceeded",
                        format!("terminated by the operating system, exit status {}", status),
                    )
                }))
            }
            TerminationReason::LaunchFailed => Some(Self::new(
                "LaunchFailed",
                outcome.launch_error().unwrap_or("interpreter could not be started"),
            )),
        }
    }
}

/// Human-readable hint for a failed run, `None` on success
pub fn suggestion(outcome: &ExecutionOutcome) -> Option<String> {
    let summary = ErrorSummary::for_outcome(outcome)?;

    let hint = match outcome.termination_reason() {
        TerminationReason::TimedOut => {
            "The code took too long. Consider optimizing or increasing the timeout. If the snippet waits on input(), pass --stdin-data or remove blocking reads."
        }
        TerminationReason::ResourceLimitExceeded => {
            "The snippet hit its CPU-time or memory ceiling and was stopped by the operating system. Process data in chunks, use generators, or raise --cpu-seconds / --mem-mb."
        }
        TerminationReason::LaunchFailed => {
            "The interpreter could not be started. Check the --python-exe path and that it is executable."
        }
        TerminationReason::CompletedNormally => hint_for(&summary.error_type),
    };

    Some(format!(
        "Error Type: {}\nError Message: {}\n\nSuggestion: {}\n\n{}",
        summary.error_type, summary.message, hint, REFERENCE
    ))
}

fn hint_for(error_type: &str) -> &'static str {
    match error_type {
        "SyntaxError" => {
            "Check for typos, missing colons, incorrect indentation, or unclosed parentheses/brackets/quotes."
        }
        "NameError" => "A variable or function was used before being defined or is misspelled.",
        "TypeError" => {
            "Incompatible data types were used together. Verify variable types before operations."
        }
        "IndentationError" => {
            "Python relies on consistent indentation. Ensure spaces/tabs are correct."
        }
        "ImportError" | "ModuleNotFoundError" => {
            "Required module not found. Install missing dependencies and check virtual environments."
        }
        "ZeroDivisionError" => "Ensure divisors are not zero before dividing.",
        "KeyError" => "Accessing missing dict key. Use dict.get() or verify the key exists.",
        "IndexError" => {
            "Sequence index is out of range or negative. Check length before accessing."
        }
        "AttributeError" => {
            "An attribute or method is missing on an object. Double-check the object's type and available attributes (dir(obj))."
        }
        "ValueError" => {
            "A function received a value of correct type but invalid content. Validate inputs before using them."
        }
        "FileNotFoundError" => {
            "The file path does not exist. Check working directory and use absolute paths if necessary."
        }
        "RecursionError" => {
            "Maximum recursion depth exceeded. Convert deep recursion to iteration or increase the limit cautiously via sys.setrecursionlimit()."
        }
        "MemoryError" => {
            "The operation ran out of memory. Process data in chunks, use generators, or increase limits."
        }
        "OSError" => {
            "An OS-level error occurred (permissions, missing resources, etc.). Log e.errno and e.strerror for details."
        }
        _ => "Review the traceback to identify where the error occurred.",
    }
}
