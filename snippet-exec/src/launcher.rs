use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tempfile::TempDir;
use tokio::{
    fs,
    process::{Child, Command},
};
use tracing::debug;

use crate::{
    error::Error,
    interpreter::DEFAULT_INTERPRETER_ARGS,
    limits::{self, Enforcement},
    types::{ResourceLimitProfile, Snippet},
};

const SNIPPET_FILE: &str = "snippet.py";

/// Private scratch directory holding the snippet file.
///
/// Removed when dropped.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub async fn create(snippet: &Snippet) -> Result<Self, Error> {
        let dir = tempfile::Builder::new()
            .prefix("snippet-")
            .tempdir()
            .map_err(|e| Error::Workspace(format!("Failed to create workspace: {}", e)))?;

        let workspace = Self { dir };
        fs::write(workspace.snippet_path(), snippet.source())
            .await
            .map_err(|e| Error::Workspace(format!("Failed to write snippet: {}", e)))?;

        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn snippet_path(&self) -> PathBuf {
        self.dir.path().join(SNIPPET_FILE)
    }
}

/// A started child process, handed over to the supervisor
pub struct LaunchedProcess {
    pub child: Child,
    /// Process group id, equal to the child's pid
    pub pgid: Option<u32>,
    pub started: Instant,
    pub enforcement: Enforcement,
    /// Kept alive until the process is reaped
    pub workspace: Workspace,
}

/// Starts one interpreter process per snippet
#[derive(Debug, Clone)]
pub struct Launcher {
    interpreter_args: Vec<String>,
}

impl Launcher {
    pub fn new(interpreter_args: Vec<String>) -> Self {
        Self { interpreter_args }
    }

    pub fn interpreter_args(&self) -> &[String] {
        &self.interpreter_args
    }

    /// Start the interpreter with limits already in force. Fails fast, no retry.
    pub async fn launch(
        &self,
        interpreter: &Path,
        snippet: &Snippet,
        profile: &ResourceLimitProfile,
        with_stdin: bool,
    ) -> Result<LaunchedProcess, Error> {
        let workspace = Workspace::create(snippet).await?;

        debug!("Launch - Interpreter: {}", interpreter.display());
        debug!("Launch - Args: {:?}", self.interpreter_args);
        debug!("Launch - Workspace: {:?}", workspace.root());

        let mut command = Command::new(interpreter);
        command
            .args(&self.interpreter_args)
            .arg(SNIPPET_FILE)
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("HOME", workspace.root())
            // The PYTHON* variables are ignored under `-I`; they only matter
            // when the configured interpreter args leave it out.
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONNOUSERSITE", "1")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("LC_ALL", "C.UTF-8")
            .env("LANG", "C.UTF-8")
            .current_dir(workspace.root())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if with_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let enforcement = limits::apply_profile(&mut command, profile);

        let started = Instant::now();
        let child = command.spawn().map_err(|e| {
            let detail = format!("{}: {}", interpreter.display(), e);
            // exec itself can run out of address space under a tight RLIMIT_AS
            if enforcement.memory && e.kind() == io::ErrorKind::OutOfMemory {
                Error::LimitAtLaunch(detail)
            } else {
                Error::Launch(detail)
            }
        })?;
        let pgid = child.id();

        debug!("Launched pid {:?}", pgid);

        Ok(LaunchedProcess {
            child,
            pgid,
            started,
            enforcement,
            workspace,
        })
    }
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new(
            DEFAULT_INTERPRETER_ARGS
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
        )
    }
}
