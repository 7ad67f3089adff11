use std::path::{Path, PathBuf};
use tracing::debug;
use which::which;

/// Arguments placed before the snippet path: isolated mode, no bytecode files
pub const DEFAULT_INTERPRETER_ARGS: &[&str] = &["-I", "-B"];

/// Locates the interpreter that will run a snippet
pub trait InterpreterResolver: Send + Sync {
    /// Returns `None` when no usable interpreter can be found
    fn resolve(&self, requested: Option<&Path>) -> Option<PathBuf>;
}

/// Uses an explicit override as given, otherwise searches `PATH`
pub struct PathResolver {
    candidates: Vec<String>,
}

impl PathResolver {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(vec!["python3".to_string(), "python".to_string()])
    }
}

impl InterpreterResolver for PathResolver {
    fn resolve(&self, requested: Option<&Path>) -> Option<PathBuf> {
        // An override that does not exist surfaces as a launch failure later.
        if let Some(path) = requested {
            // The child starts inside its workspace, so anchor relative paths
            // here. Bare names are still looked up on PATH at spawn.
            if path.is_relative() && path.components().count() > 1 {
                if let Ok(cwd) = std::env::current_dir() {
                    return Some(cwd.join(path));
                }
            }
            return Some(path.to_path_buf());
        }

        let found = self
            .candidates
            .iter()
            .find_map(|candidate| which(candidate).ok());
        debug!("Resolved interpreter from PATH: {:?}", found);
        found
    }
}
