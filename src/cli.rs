use clap::Parser;
use std::path::PathBuf;

use crate::config::{self, Overrides};

/// Run a Python snippet under CPU, memory and wall-clock limits
#[derive(Parser, Debug)]
#[command(name = "snippet-runner", author, version, about, long_about = None)]
pub struct Cli {
    /// Snippet source. Read from stdin when neither CODE nor --file is given
    #[arg(value_name = "CODE", conflicts_with = "file")]
    pub code: Option<String>,

    /// Read the snippet from a file
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Data passed to the snippet on its stdin
    #[arg(long, value_name = "TEXT")]
    pub stdin_data: Option<String>,

    /// Wall-clock timeout in seconds, fractions allowed [default: 5]
    #[arg(long, value_name = "SECONDS", value_parser = parse_timeout)]
    pub timeout: Option<f64>,

    /// CPU time ceiling in seconds [default: 5]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub cpu_seconds: Option<u64>,

    /// Memory ceiling in megabytes [default: 128]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub mem_mb: Option<u64>,

    /// Python interpreter to use instead of the one on PATH
    #[arg(long, value_name = "PATH")]
    pub python_exe: Option<PathBuf>,

    /// Print a single JSON document instead of text
    #[arg(long)]
    pub json: bool,

    /// Also show the snippet passed through a code formatter, when one is installed
    #[arg(long)]
    pub format: bool,

    /// Also run a linter over the snippet, when one is installed
    #[arg(long)]
    pub lint: bool,

    /// Ask the completer for a corrected snippet when the run fails
    #[arg(long)]
    pub repair: bool,

    /// Completion command reading a prompt on stdin
    #[arg(long, value_name = "CMD", env = "OFFLINE_LLM_CMD")]
    pub completer_cmd: Option<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH", env = "SNIPPET_RUNNER_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            cpu_seconds: self.cpu_seconds,
            memory_mb: self.mem_mb,
            timeout_seconds: self.timeout,
            python_exe: self.python_exe.clone(),
            completer_cmd: self.completer_cmd.clone(),
        }
    }
}

fn parse_timeout(value: &str) -> Result<f64, String> {
    let secs: f64 = value.parse().map_err(|e| format!("{}", e))?;
    config::seconds(secs).map_err(|e| e.to_string())?;
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "snippet-runner",
            "--timeout",
            "0.5",
            "--cpu-seconds",
            "2",
            "--mem-mb",
            "64",
            "--json",
            "--lint",
            "print(1)",
        ])
        .unwrap();

        assert_eq!(cli.code.as_deref(), Some("print(1)"));
        assert!(cli.json);
        assert!(cli.lint);
        assert!(!cli.format);
        let overrides = cli.overrides();
        assert_eq!(overrides.timeout_seconds, Some(0.5));
        assert_eq!(overrides.cpu_seconds, Some(2));
        assert_eq!(overrides.memory_mb, Some(64));
    }

    #[test]
    fn test_code_conflicts_with_file() {
        let result = Cli::try_parse_from(["snippet-runner", "-f", "a.py", "print(1)"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_limits() {
        for args in [
            ["snippet-runner", "--timeout", "0"],
            ["snippet-runner", "--timeout", "-2"],
            ["snippet-runner", "--timeout", "soon"],
            ["snippet-runner", "--cpu-seconds", "0"],
            ["snippet-runner", "--mem-mb", "0"],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "{:?} accepted", args);
        }
    }
}
