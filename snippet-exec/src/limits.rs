//! Applies a [`ResourceLimitProfile`] to a process before it starts running.
//!
//! On Unix the limits are installed by a `pre_exec` hook, so they are already
//! in force when the interpreter is exec'd. Targets without the matching
//! primitives fall back to wall-clock enforcement only and report which
//! limits were left out through [`Enforcement`].

use tokio::process::Command;
use tracing::debug;

use crate::types::{LimitKind, ResourceLimitProfile};

/// Which limits of a profile the platform actually applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enforcement {
    pub cpu_time: bool,
    pub memory: bool,
}

impl Enforcement {
    pub fn full() -> Self {
        Self {
            cpu_time: true,
            memory: true,
        }
    }

    pub fn none() -> Self {
        Self {
            cpu_time: false,
            memory: false,
        }
    }

    pub fn unenforced(&self) -> Vec<LimitKind> {
        let mut kinds = Vec::new();
        if !self.cpu_time {
            kinds.push(LimitKind::CpuTime);
        }
        if !self.memory {
            kinds.push(LimitKind::Memory);
        }
        kinds
    }
}

/// Install the profile on a command that has not been spawned yet
#[cfg(unix)]
pub fn apply_profile(command: &mut Command, profile: &ResourceLimitProfile) -> Enforcement {
    use nix::sys::resource::{getrlimit, setrlimit, Resource};

    // Soft limit raises SIGXCPU, the hard limit one second later is SIGKILL.
    let cpu_soft = profile.cpu_seconds();
    let cpu_hard = cpu_soft.saturating_add(1);
    let memory = profile.memory_bytes();
    let file_size = profile.max_file_size_bytes();
    let open_files = profile.max_open_files();

    debug!(
        "Applying limits - cpu: {}s, memory: {} bytes, file size: {} bytes, open files: {}",
        cpu_soft, memory, file_size, open_files
    );

    // Never ask for more than the inherited hard limit, an unprivileged
    // process cannot raise it.
    fn lower(resource: Resource, soft: u64, hard: u64) -> nix::Result<()> {
        let (_, current_hard) = getrlimit(resource)?;
        let hard = hard.min(current_hard);
        setrlimit(resource, soft.min(hard), hard)
    }

    // SAFETY: the hook runs in the forked child before exec. It only calls
    // getrlimit/setrlimit and captures Copy values.
    unsafe {
        command.pre_exec(move || {
            lower(Resource::RLIMIT_CPU, cpu_soft, cpu_hard)?;
            #[cfg(not(target_os = "macos"))]
            lower(Resource::RLIMIT_AS, memory, memory)?;
            lower(Resource::RLIMIT_FSIZE, file_size, file_size)?;

            let (current_soft, current_hard) = getrlimit(Resource::RLIMIT_NOFILE)?;
            setrlimit(
                Resource::RLIMIT_NOFILE,
                open_files.min(current_soft),
                current_hard,
            )?;

            Ok(())
        });
    }

    #[cfg(target_os = "macos")]
    {
        tracing::warn!("Memory limits are not enforced on macOS, only CPU time and wall-clock apply");
        Enforcement {
            cpu_time: true,
            memory: false,
        }
    }

    #[cfg(not(target_os = "macos"))]
    {
        Enforcement::full()
    }
}

#[cfg(not(unix))]
pub fn apply_profile(_command: &mut Command, profile: &ResourceLimitProfile) -> Enforcement {
    tracing::warn!(
        "No resource limit support on this platform, CPU ({}s) and memory ({} MB) ceilings are not enforced",
        profile.cpu_seconds(),
        profile.memory_mb()
    );
    Enforcement::none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unenforced_kinds() {
        assert!(Enforcement::full().unenforced().is_empty());
        assert_eq!(
            Enforcement::none().unenforced(),
            vec![LimitKind::CpuTime, LimitKind::Memory]
        );
        let partial = Enforcement {
            cpu_time: true,
            memory: false,
        };
        assert_eq!(partial.unenforced(), vec![LimitKind::Memory]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_enforces_everything() {
        let mut command = Command::new("true");
        let enforcement = apply_profile(&mut command, &ResourceLimitProfile::default());
        assert_eq!(enforcement, Enforcement::full());
    }
}
