use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::errors::ExecError;
use super::process::{CapturedOutput, ProcessOutcome, ProcessRunner, SpawnSpec};
use super::result::ExecutionResult;
use super::tokenizer::Invocation;
use super::traits::{CommandExecutor, ExecutionRequest, HealthStatus};

/// Timeout for the shell check in [`LocalExecutor::health_check`]
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Local executor that runs commands on the host, one at a time
///
/// Commands run strictly in declaration order because later commands may
/// depend on what earlier ones produced. The first command that does not
/// complete with exit code 0 ends the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor {
    runner: ProcessRunner,
}

impl LocalExecutor {
    /// Creates a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self {
            runner: ProcessRunner::new(),
        }
    }

    /// Runs every command in order, stopping at the first failure
    ///
    /// Blank commands are skipped. `timeout` applies to each command
    /// separately; the clock restarts for every command.
    pub async fn run_all<S>(
        &self,
        working_dir: &Path,
        commands: &[S],
        timeout: Duration,
    ) -> ExecutionResult
    where
        S: AsRef<str>,
    {
        let span = info_span!(
            "host_run",
            run_id = %Uuid::new_v4(),
            working_dir = %working_dir.display()
        );
        self.run_sequence(working_dir, commands, timeout)
            .instrument(span)
            .await
    }

    async fn run_sequence<S>(
        &self,
        working_dir: &Path,
        commands: &[S],
        timeout: Duration,
    ) -> ExecutionResult
    where
        S: AsRef<str>,
    {
        info!(
            commands_count = commands.len(),
            timeout_ms = timeout.as_millis(),
            "Starting host run"
        );

        let mut aggregate = CapturedOutput::default();

        // Invariant: every command before the current one completed with 0.
        for (index, command) in commands.iter().enumerate() {
            let Some(invocation) = Invocation::parse(command.as_ref()) else {
                debug!(index, "Skipping blank command");
                continue;
            };

            debug!(index, command = %invocation, "Running command");
            let spec = SpawnSpec::new(invocation, timeout).in_dir(working_dir);
            let run = self.runner.spawn(&spec).await;
            aggregate.append(run.output);

            if let ProcessOutcome::Completed(code) = run.outcome
                && code != 0
            {
                let error = ExecError::NonZeroExit {
                    command: spec.invocation.source().to_string(),
                    code,
                };
                warn!(index, %error, "Command failed, stopping run");
            }
            if !run.outcome.is_success() {
                return aggregate.into_result(run.outcome.exit_code());
            }
        }

        info!("All commands succeeded");
        aggregate.into_result(0)
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.run_all(&request.working_dir, request.commands.as_slice(), request.timeout)
            .await
    }

    async fn health_check(&self) -> HealthStatus {
        let spec = SpawnSpec::new(Invocation::new("sh", ["-c", "true"]), HEALTH_CHECK_TIMEOUT);
        let run = self.runner.spawn(&spec).await;

        match run.outcome {
            ProcessOutcome::Completed(0) => HealthStatus::Healthy {
                detail: "sh available".to_string(),
            },
            ProcessOutcome::Completed(code) => HealthStatus::Unhealthy {
                reason: format!("Shell check exited with code {code}"),
            },
            ProcessOutcome::TimedOut => HealthStatus::Unhealthy {
                reason: "Shell check timed out".to_string(),
            },
            ProcessOutcome::SpawnFailed(reason) => HealthStatus::Unhealthy {
                reason: format!("Shell not available: {reason}"),
            },
        }
    }
}
