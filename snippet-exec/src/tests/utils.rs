pub mod defaults {
    use crate::ResourceLimitProfile;
    use std::path::PathBuf;
    use std::time::Duration;

    pub fn profile(cpu_secs: u64, memory_mb: u64, timeout: Duration) -> ResourceLimitProfile {
        ResourceLimitProfile::new(Duration::from_secs(cpu_secs), memory_mb, timeout)
            .expect("test profile is valid")
    }

    pub fn default_test_limits() -> ResourceLimitProfile {
        profile(5, 256, Duration::from_secs(10))
    }

    /// Python interpreter for the tests, `None` skips them
    pub fn python() -> Option<PathBuf> {
        let found = which::which("python3").or_else(|_| which::which("python")).ok();
        if found.is_none() {
            eprintln!("python not found on PATH, skipping");
        }
        found
    }

    pub fn shell() -> PathBuf {
        which::which("sh").unwrap_or_else(|_| PathBuf::from("/bin/sh"))
    }
}

pub mod services {
    use crate::{Launcher, SnippetExecutionService};

    pub fn python_service() -> SnippetExecutionService {
        SnippetExecutionService::new()
    }

    /// Runs snippets as `sh snippet.py`
    pub fn shell_service() -> SnippetExecutionService {
        SnippetExecutionService::new().with_launcher(Launcher::new(Vec::new()))
    }
}

#[cfg(target_os = "linux")]
pub mod procfs {
    use std::time::Duration;

    /// Gone or a zombie waiting to be reaped by init
    fn is_dead(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
        }
    }

    pub async fn wait_until_dead(pid: u32) -> bool {
        for _ in 0..40 {
            if is_dead(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        is_dead(pid)
    }
}
