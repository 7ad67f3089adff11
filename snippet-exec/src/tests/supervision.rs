//! Lifecycle tests driven by `sh`, independent of any Python install

use super::{
    fixtures::shell::*,
    utils::{
        defaults::{default_test_limits, profile, shell},
        services::shell_service,
    },
};
use crate::{ExecutionRequest, ExitStatus, Result, Snippet, TerminationReason};
use std::time::Duration;

fn request(script: &str) -> ExecutionRequest {
    ExecutionRequest::new(Snippet::literal(script))
        .with_interpreter(shell())
        .with_profile(default_test_limits())
}

#[tokio::test]
async fn test_exit_code_and_streams_are_separate() -> Result<()> {
    let outcome = shell_service().execute(&request(EXIT_SEVEN)).await?;

    assert_eq!(outcome.termination_reason(), TerminationReason::CompletedNormally);
    assert_eq!(outcome.exit_status(), Some(ExitStatus::Exited(7)));
    assert_eq!(outcome.stdout(), Some("out\n"));
    assert_eq!(outcome.stderr(), Some("err\n"));
    assert!(!outcome.is_success());
    Ok(())
}

#[tokio::test]
async fn test_stdin_payload_is_delivered_exactly() -> Result<()> {
    let payload = "line one\nline two without newline";
    let outcome = shell_service()
        .execute(&request(ECHO_STDIN).with_stdin(payload))
        .await?;

    assert_eq!(outcome.stdout(), Some(payload));
    assert!(outcome.is_success());
    Ok(())
}

#[tokio::test]
async fn test_missing_stdin_reads_as_empty() -> Result<()> {
    let outcome = shell_service().execute(&request(ECHO_STDIN)).await?;
    assert_eq!(outcome.stdout(), Some(""));
    assert!(outcome.is_success());
    Ok(())
}

#[tokio::test]
async fn test_wall_clock_timeout() -> Result<()> {
    let request = request(SLEEP).with_profile(profile(5, 256, Duration::from_secs(1)));
    let outcome = shell_service().execute(&request).await?;

    assert_eq!(outcome.termination_reason(), TerminationReason::TimedOut);
    assert!(outcome.elapsed() >= Duration::from_secs(1));
    assert!(outcome.elapsed() < Duration::from_secs(3));
    Ok(())
}

#[tokio::test]
async fn test_timeout_keeps_partial_output() -> Result<()> {
    let request = request(PARTIAL_THEN_SLEEP).with_profile(profile(5, 256, Duration::from_secs(1)));
    let outcome = shell_service().execute(&request).await?;

    assert_eq!(outcome.termination_reason(), TerminationReason::TimedOut);
    assert_eq!(outcome.stdout(), Some("partial\n"));
    assert_eq!(outcome.stderr(), Some("oops\n"));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_cpu_limit_kills_before_timeout() -> Result<()> {
    let request = request(SPIN).with_profile(profile(1, 256, Duration::from_secs(10)));
    let outcome = shell_service().execute(&request).await?;

    assert_eq!(
        outcome.termination_reason(),
        TerminationReason::ResourceLimitExceeded
    );
    assert!(outcome.exit_status().and_then(|s| s.signal()).is_some());
    assert!(outcome.elapsed() < Duration::from_secs(10));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_cpu_kill_keeps_partial_output() -> Result<()> {
    let request = request(PARTIAL_THEN_SPIN).with_profile(profile(1, 256, Duration::from_secs(10)));
    let outcome = shell_service().execute(&request).await?;

    assert_eq!(
        outcome.termination_reason(),
        TerminationReason::ResourceLimitExceeded
    );
    assert_eq!(outcome.stdout(), Some("partial\n"));
    Ok(())
}

#[tokio::test]
async fn test_memory_words_on_stderr_stay_completed() -> Result<()> {
    let outcome = shell_service().execute(&request(MEMORY_WORDS_THEN_EXIT)).await?;

    assert_eq!(outcome.termination_reason(), TerminationReason::CompletedNormally);
    assert_eq!(outcome.exit_status(), Some(ExitStatus::Exited(2)));
    Ok(())
}

#[tokio::test]
async fn test_child_environment_is_scrubbed() -> Result<()> {
    let outcome = shell_service().execute(&request(PRINT_ENV)).await?;
    assert_eq!(outcome.stdout(), Some("1 1 C.UTF-8\n"));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_signal_death_is_never_completed() -> Result<()> {
    let outcome = shell_service().execute(&request(SELF_KILL)).await?;
    assert_ne!(
        outcome.termination_reason(),
        TerminationReason::CompletedNormally
    );
    Ok(())
}

#[tokio::test]
async fn test_invalid_interpreter_is_launch_failure() -> Result<()> {
    let request = request(EXIT_SEVEN).with_interpreter("/nonexistent/bin/sh");
    let outcome = shell_service().execute(&request).await?;

    assert_eq!(outcome.termination_reason(), TerminationReason::LaunchFailed);
    assert!(outcome.stdout().is_none());
    assert!(outcome.stderr().is_none());
    assert!(outcome.exit_status().is_none());
    assert!(outcome.launch_error().is_some());
    Ok(())
}

#[cfg(target_os = "linux")]
mod orphans {
    use super::*;
    use crate::tests::utils::procfs::wait_until_dead;

    fn background_pid(stdout: Option<&str>) -> u32 {
        stdout
            .and_then(|s| s.lines().next())
            .and_then(|line| line.trim().parse().ok())
            .expect("script prints the background pid")
    }

    #[tokio::test]
    async fn test_background_child_killed_after_exit() -> Result<()> {
        let outcome = shell_service().execute(&request(ORPHAN_AND_EXIT)).await?;

        assert_eq!(outcome.termination_reason(), TerminationReason::CompletedNormally);
        let pid = background_pid(outcome.stdout());
        assert!(wait_until_dead(pid).await, "background pid {} survived", pid);
        Ok(())
    }

    #[tokio::test]
    async fn test_background_child_killed_after_timeout() -> Result<()> {
        let request =
            request(ORPHAN_AND_BLOCK).with_profile(profile(5, 256, Duration::from_secs(1)));
        let outcome = shell_service().execute(&request).await?;

        assert_eq!(outcome.termination_reason(), TerminationReason::TimedOut);
        let pid = background_pid(outcome.stdout());
        assert!(wait_until_dead(pid).await, "background pid {} survived", pid);
        Ok(())
    }
}
