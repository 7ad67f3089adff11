//! Drives one launched process to a terminal state.
//!
//! The wait for the child races its natural exit against the wall-clock
//! deadline. Whatever the outcome, the whole process group is killed and the
//! leader reaped before [`Supervisor::supervise`] returns.

use std::fmt;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    sync::oneshot,
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, error, warn};

use crate::{
    diagnose,
    error::Error,
    launcher::LaunchedProcess,
    limits::Enforcement,
    outcome::ExecutionOutcome,
    types::{ExitStatus, ResourceLimitProfile, TerminationReason},
};

/// How long output readers may keep draining after the process is gone
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle of one supervised execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Running,
    Completed,
    TimedOut,
    ResourceKilled,
    LaunchFailed,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, State::Pending | State::Running)
    }
}

impl From<TerminationReason> for State {
    fn from(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::CompletedNormally => State::Completed,
            TerminationReason::TimedOut => State::TimedOut,
            TerminationReason::ResourceLimitExceeded => State::ResourceKilled,
            TerminationReason::LaunchFailed => State::LaunchFailed,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub(crate) fn transition(from: State, to: State) -> State {
    debug!("Supervisor state {} -> {}", from, to);
    to
}

/// Kills the process group when dropped, so a cancelled supervision never
/// leaves the tree running.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    #[cfg(unix)]
    fn kill(&self) {
        use nix::{
            errno::Errno,
            sys::signal::{killpg, Signal},
            unistd::Pid,
        };

        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
        }
    }

    // Only the leader is reachable here, through kill_on_drop.
    #[cfg(not(unix))]
    fn kill(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Collects one output stream in full, in the order it was written
struct Capture {
    handle: JoinHandle<Vec<u8>>,
    stop: oneshot::Sender<()>,
}

impl Capture {
    fn spawn<R>(mut reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (stop, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut collected = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                tokio::select! {
                    read = reader.read(&mut chunk) => match read {
                        Ok(0) => break,
                        Ok(n) => collected.extend_from_slice(&chunk[..n]),
                        Err(e) => {
                            debug!("Output stream closed with error: {}", e);
                            break;
                        }
                    },
                    _ = &mut stop_rx => break,
                }
            }
            collected
        });

        Self { handle, stop }
    }

    /// Wait for EOF, or for `grace` at most, keeping whatever was read.
    async fn finish(self, grace: Duration) -> Vec<u8> {
        let Capture { mut handle, stop } = self;
        match time::timeout(grace, &mut handle).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                // A descendant outside the group still holds the pipe open.
                debug!("Output drain exceeded {:?}, stopping reader", grace);
                let _ = stop.send(());
                handle.await.unwrap_or_default()
            }
        }
    }
}

async fn collect(capture: Option<Capture>, grace: Duration) -> String {
    match capture {
        Some(capture) => String::from_utf8_lossy(&capture.finish(grace).await).into_owned(),
        None => String::new(),
    }
}

#[cfg(unix)]
fn is_cpu_limit_signal(signal: i32) -> bool {
    signal == nix::libc::SIGXCPU
}

#[cfg(not(unix))]
fn is_cpu_limit_signal(_signal: i32) -> bool {
    false
}

/// Classify how a reaped process ended.
///
/// A signal the supervisor did not send always means the operating system
/// stopped the child, and wins over the deadline when it is `SIGXCPU`.
pub(crate) fn classify(
    status: ExitStatus,
    deadline_hit: bool,
    stderr: &str,
    enforcement: Enforcement,
) -> TerminationReason {
    match status {
        ExitStatus::Signaled(signal) if is_cpu_limit_signal(signal) => {
            TerminationReason::ResourceLimitExceeded
        }
        _ if deadline_hit => TerminationReason::TimedOut,
        ExitStatus::Signaled(_) => TerminationReason::ResourceLimitExceeded,
        ExitStatus::Exited(0) => TerminationReason::CompletedNormally,
        ExitStatus::Exited(_)
            if enforcement.memory && diagnose::mentions_memory_exhaustion(stderr) =>
        {
            TerminationReason::ResourceLimitExceeded
        }
        ExitStatus::Exited(_) => TerminationReason::CompletedNormally,
    }
}

/// Owns one launched process until it reaches a terminal state
#[derive(Debug, Clone)]
pub struct Supervisor {
    drain_grace: Duration,
}

impl Supervisor {
    pub fn new(drain_grace: Duration) -> Self {
        Self { drain_grace }
    }

    pub async fn supervise(
        &self,
        process: LaunchedProcess,
        stdin: Option<Vec<u8>>,
        profile: &ResourceLimitProfile,
    ) -> Result<ExecutionOutcome, Error> {
        let LaunchedProcess {
            mut child,
            pgid,
            started,
            enforcement,
            workspace,
        } = process;
        let state = transition(State::Pending, State::Running);

        let group = ProcessGroup { pgid };
        let deadline = Instant::from_std(started) + profile.wall_timeout();

        let stdout = child.stdout.take().map(Capture::spawn);
        let stderr = child.stderr.take().map(Capture::spawn);

        let writer = match (stdin, child.stdin.take()) {
            (Some(data), Some(mut pipe)) => Some(tokio::spawn(async move {
                // The snippet may exit without reading; a broken pipe is fine.
                if let Err(e) = pipe.write_all(&data).await {
                    debug!("Stdin payload not fully delivered: {}", e);
                }
                let _ = pipe.shutdown().await;
            })),
            _ => None,
        };

        let (status, deadline_hit) = match time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => (status, false),
            Ok(Err(e)) => {
                error!("Failed to wait for child: {}", e);
                group.kill();
                let _ = child.kill().await;
                return Err(Error::Supervision(format!("Process wait error: {}", e)));
            }
            Err(_) => {
                debug!(
                    "Wall-clock timeout of {:?} reached, killing process group {:?}",
                    profile.wall_timeout(),
                    pgid
                );
                group.kill();
                let status = child.wait().await.map_err(|e| {
                    Error::Supervision(format!("Failed to reap timed out process: {}", e))
                })?;
                (status, true)
            }
        };
        let elapsed = started.elapsed();

        // Descendants that outlived the leader go too.
        group.kill();
        if let Some(writer) = writer {
            writer.abort();
        }

        let stdout = collect(stdout, self.drain_grace).await;
        let stderr = collect(stderr, self.drain_grace).await;
        drop(workspace);

        let exit_status = ExitStatus::from(status);
        let reason = classify(exit_status, deadline_hit, &stderr, enforcement);
        transition(state, State::from(reason));

        Ok(ExecutionOutcome::finished(
            stdout,
            stderr,
            exit_status,
            elapsed,
            reason,
            enforcement.unenforced(),
        ))
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_DRAIN_GRACE)
    }
}
