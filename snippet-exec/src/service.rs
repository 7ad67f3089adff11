use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    adapter::{extract_code, repair_prompt, Completer, Formatter, LintFinding, Linter},
    diagnose::ErrorSummary,
    error::{AdapterError, Error},
    interpreter::{InterpreterResolver, PathResolver},
    launcher::Launcher,
    outcome::ExecutionOutcome,
    supervisor::Supervisor,
    types::ExecutionRequest,
};

/// Entry point: one call runs one snippet to a terminal state.
///
/// Holds no per-execution state, so a single service can serve any number of
/// concurrent requests with different profiles.
#[derive(Clone)]
pub struct SnippetExecutionService {
    resolver: Arc<dyn InterpreterResolver>,
    launcher: Launcher,
    supervisor: Supervisor,
}

impl SnippetExecutionService {
    pub fn new() -> Self {
        Self {
            resolver: Arc::new(PathResolver::default()),
            launcher: Launcher::default(),
            supervisor: Supervisor::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn InterpreterResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_supervisor(mut self, supervisor: Supervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Launch failures, timeouts and limit kills are reported in the
    /// outcome. `Err` means supervision itself broke down.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, Error> {
        let execution_id = Uuid::new_v4();
        let span = info_span!("execute", %execution_id);
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, Error> {
        let profile = &request.profile;
        debug!(
            "Starting snippet from {} - cpu: {:?}, memory: {} MB, timeout: {:?}",
            request.snippet.origin(),
            profile.cpu_time(),
            profile.memory_mb(),
            profile.wall_timeout()
        );
        if profile.wall_timeout() < profile.cpu_time() {
            warn!("Wall-clock timeout is shorter than the CPU limit and will usually fire first");
        }

        let started = Instant::now();
        let Some(interpreter) = self.resolver.resolve(request.interpreter.as_deref()) else {
            warn!("No interpreter found");
            return Ok(ExecutionOutcome::launch_failed(
                "No Python interpreter found on PATH",
                started.elapsed(),
            ));
        };

        let process = match self
            .launcher
            .launch(
                &interpreter,
                &request.snippet,
                profile,
                request.stdin.is_some(),
            )
            .await
        {
            Ok(process) => process,
            Err(e @ Error::LimitAtLaunch(_)) => {
                warn!("{}", e);
                return Ok(ExecutionOutcome::rejected_by_limits(
                    e.to_string(),
                    started.elapsed(),
                ));
            }
            Err(e) => {
                warn!("{}", e);
                return Ok(ExecutionOutcome::launch_failed(
                    e.to_string(),
                    started.elapsed(),
                ));
            }
        };

        let outcome = self
            .supervisor
            .supervise(process, request.stdin.clone(), profile)
            .await?;

        info!(
            "Snippet finished: {} (exit status {:?}) in {:.3}s",
            outcome.termination_reason(),
            outcome.exit_status(),
            outcome.elapsed().as_secs_f64()
        );
        Ok(outcome)
    }

    /// Runs the snippet and, concurrently, the formatter. Formatter problems
    /// only cost the formatted text.
    pub async fn execute_with_formatter(
        &self,
        request: &ExecutionRequest,
        formatter: Option<&dyn Formatter>,
    ) -> Result<(ExecutionOutcome, Option<String>), Error> {
        let format = async {
            let formatter = formatter?;
            match formatter.format(request.snippet.source()).await {
                Ok(formatted) => Some(formatted),
                Err(AdapterError::Unavailable(tool)) => {
                    debug!("Formatter {} not available, skipping", tool);
                    None
                }
                Err(e) => {
                    warn!("Formatter {} failed: {}", formatter.name(), e);
                    None
                }
            }
        };

        let (outcome, formatted) = tokio::join!(self.execute(request), format);
        Ok((outcome?, formatted))
    }

    /// Lint the snippet source. Linter problems only cost the findings.
    pub async fn lint(
        &self,
        request: &ExecutionRequest,
        linter: &dyn Linter,
    ) -> Option<Vec<LintFinding>> {
        match linter.lint(request.snippet.source()).await {
            Ok(findings) => Some(findings),
            Err(AdapterError::Unavailable(tool)) => {
                debug!("Linter {} not available, skipping", tool);
                None
            }
            Err(e) => {
                warn!("Linter {} failed: {}", linter.name(), e);
                None
            }
        }
    }

    /// Ask a completer for a corrected snippet. `None` for successful runs or
    /// when the completer cannot help.
    pub async fn suggest_repair(
        &self,
        request: &ExecutionRequest,
        outcome: &ExecutionOutcome,
        completer: &dyn Completer,
    ) -> Option<String> {
        if outcome.is_success() {
            return None;
        }

        let summary = ErrorSummary::for_outcome(outcome);
        let prompt = repair_prompt(request.snippet.source(), summary.as_ref());
        match completer.complete(&prompt).await {
            Ok(completion) if !completion.trim().is_empty() => Some(extract_code(&completion)),
            Ok(_) => {
                debug!("Completer returned nothing");
                None
            }
            Err(e) => {
                warn!("Completer failed: {}", e);
                None
            }
        }
    }
}

impl Default for SnippetExecutionService {
    fn default() -> Self {
        Self::new()
    }
}
