use serde::Deserialize;
use snippet_exec::{adapter::ToolCommand, Launcher, ResourceLimitProfile};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Profile(#[from] snippet_exec::Error),
}

/// Contents of the optional TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub limits: LimitSettings,
    pub interpreter: InterpreterSettings,
    pub formatter: ToolSettings,
    pub completer: ToolSettings,
    pub linter: ToolSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitSettings {
    pub cpu_seconds: Option<u64>,
    pub memory_mb: Option<u64>,
    pub timeout_seconds: Option<f64>,
    pub max_file_size_bytes: Option<u64>,
    pub max_open_files: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpreterSettings {
    /// Interpreter executable, otherwise looked up on PATH
    pub path: Option<PathBuf>,
    /// Flags placed before the snippet path
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Whitespace-separated command line
    pub command: Option<String>,
}

/// Values given on the command line. They win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cpu_seconds: Option<u64>,
    pub memory_mb: Option<u64>,
    pub timeout_seconds: Option<f64>,
    pub python_exe: Option<PathBuf>,
    pub completer_cmd: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn merge(mut self, overrides: Overrides) -> Self {
        let limits = &mut self.limits;
        limits.cpu_seconds = overrides.cpu_seconds.or(limits.cpu_seconds);
        limits.memory_mb = overrides.memory_mb.or(limits.memory_mb);
        limits.timeout_seconds = overrides.timeout_seconds.or(limits.timeout_seconds);
        self.interpreter.path = overrides.python_exe.or(self.interpreter.path);
        self.completer.command = overrides.completer_cmd.or(self.completer.command);
        self
    }

    pub fn profile(&self) -> Result<ResourceLimitProfile, ConfigError> {
        let limits = &self.limits;
        let cpu = limits
            .cpu_seconds
            .unwrap_or(ResourceLimitProfile::DEFAULT_CPU_SECONDS);
        let memory_mb = limits
            .memory_mb
            .unwrap_or(ResourceLimitProfile::DEFAULT_MEMORY_MB);
        let timeout = match limits.timeout_seconds {
            Some(secs) => seconds(secs)?,
            None => Duration::from_secs(ResourceLimitProfile::DEFAULT_TIMEOUT_SECONDS),
        };

        let mut profile = ResourceLimitProfile::new(Duration::from_secs(cpu), memory_mb, timeout)?;
        if let Some(bytes) = limits.max_file_size_bytes {
            profile = profile.with_max_file_size(bytes)?;
        }
        if let Some(count) = limits.max_open_files {
            profile = profile.with_max_open_files(count)?;
        }
        Ok(profile)
    }

    pub fn launcher(&self) -> Launcher {
        match &self.interpreter.args {
            Some(args) => Launcher::new(args.clone()),
            None => Launcher::default(),
        }
    }

    pub fn formatter_command(&self) -> Result<Option<ToolCommand>, ConfigError> {
        tool_command("formatter", self.formatter.command.as_deref())
    }

    pub fn completer_command(&self) -> Result<Option<ToolCommand>, ConfigError> {
        tool_command("completer", self.completer.command.as_deref())
    }

    pub fn linter_command(&self) -> Result<Option<ToolCommand>, ConfigError> {
        tool_command("linter", self.linter.command.as_deref())
    }
}

/// Positive, finite seconds
pub fn seconds(secs: f64) -> Result<Duration, ConfigError> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "timeout must be a positive number of seconds, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::Invalid(format!("timeout {}: {}", secs, e)))
}

fn tool_command(kind: &str, line: Option<&str>) -> Result<Option<ToolCommand>, ConfigError> {
    match line {
        None => Ok(None),
        Some(line) => ToolCommand::parse(line)
            .map(Some)
            .ok_or_else(|| ConfigError::Invalid(format!("{} command is empty", kind))),
    }
}
