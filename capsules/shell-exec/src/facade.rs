//! Single entry point for collaborators: classify, confine, dispatch, run.

use std::time::{Duration, Instant};

use config_loader::EngineConfig;
use tracing::{info, instrument, warn, Span};
use wards::{CommandPolicy, PathSandbox, PolicyConfig, PolicyVerdict};

use crate::dispatch::{LanguageDispatcher, PreparedCode};
use crate::error::ExecError;
use crate::executor::{ProcessExecutor, ProcessRunner};
use crate::types::{CodeExecutionResult, ExecutionRequest, ExecutionResult, ExecutionTarget, Stage};

/// Stateless apart from its configuration; share it behind an `Arc`.
pub struct ExecutionFacade<R: ProcessRunner = ProcessExecutor> {
    config: EngineConfig,
    policy: CommandPolicy,
    sandbox: PathSandbox,
    dispatcher: LanguageDispatcher,
    runner: R,
}

impl ExecutionFacade<ProcessExecutor> {
    /// Real process execution with the default policy plus `WARDS_EXTRA_BLOCKED`.
    pub fn from_config(config: EngineConfig) -> Result<Self, ExecError> {
        let runner = ProcessExecutor::from_config(&config);
        Self::new(config, wards::config::load_from_env(), runner)
    }
}

impl<R: ProcessRunner> ExecutionFacade<R> {
    /// Creates the workspace root if it does not exist yet.
    pub fn new(config: EngineConfig, policy: PolicyConfig, runner: R) -> Result<Self, ExecError> {
        let sandbox = PathSandbox::new(&config.workspace_root).map_err(|e| {
            ExecError::io(
                &format!(
                    "Failed to prepare workspace {}",
                    config.workspace_root.display()
                ),
                e,
            )
        })?;
        let dispatcher = LanguageDispatcher::new(sandbox.root_path());
        info!(workspace = %sandbox.root_path().display(), "execution facade ready");
        Ok(Self {
            config,
            policy: CommandPolicy::new(policy),
            sandbox,
            dispatcher,
            runner,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workspace(&self) -> &PathSandbox {
        &self.sandbox
    }

    pub fn dispatcher(&self) -> &LanguageDispatcher {
        &self.dispatcher
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn classify(&self, command: &str) -> PolicyVerdict {
        self.policy.classify(command)
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError> {
        match &request.target {
            ExecutionTarget::Command { command } => {
                self.execute_command(
                    command,
                    request.working_directory.as_deref(),
                    request.timeout_seconds,
                )
                .await
            }
            ExecutionTarget::Code { language, source } => {
                if let Some(dir) = request.working_directory.as_deref() {
                    if !dir.trim().is_empty() {
                        return Err(ExecError::InvalidRequest {
                            message: "code always runs at the workspace root; \
                                      workingDirectory is only valid for commands"
                                .to_string(),
                        });
                    }
                }
                self.run_code(language, source, request.timeout_seconds)
                    .await
                    .map(|code| code.result)
            }
        }
    }

    #[instrument(skip(self, working_directory), fields(cwd = tracing::field::Empty))]
    pub async fn execute_command(
        &self,
        command: &str,
        working_directory: Option<&str>,
        timeout_seconds: Option<u64>,
    ) -> Result<ExecutionResult, ExecError> {
        let verdict = self.policy.classify(command);
        if !verdict.is_allowed() {
            warn!(reason = %verdict.reason(), "command rejected by policy");
            return Err(ExecError::PolicyViolation { verdict });
        }

        let cwd = self.sandbox.resolve(working_directory);
        Span::current().record("cwd", tracing::field::display(&cwd));

        let timeout = self.config.effective_timeout(timeout_seconds);
        let outcome = self.runner.run(command, &cwd, timeout).await;
        log_outcome(&outcome);
        outcome
    }

    /// Runs a snippet with the configured default timeout.
    pub async fn execute_code(
        &self,
        language: &str,
        source: &str,
    ) -> Result<CodeExecutionResult, ExecError> {
        self.run_code(language, source, None).await
    }

    #[instrument(skip(self, source), fields(bytes = source.len()))]
    async fn run_code(
        &self,
        language: &str,
        source: &str,
        timeout_seconds: Option<u64>,
    ) -> Result<CodeExecutionResult, ExecError> {
        let PreparedCode {
            steps,
            source: temp,
            ..
        } = self.dispatcher.prepare(language, source)?;

        let cwd = self.sandbox.root();
        let timeout = self.config.effective_timeout(timeout_seconds);
        // None when the configured maximum is beyond what Instant can represent
        let deadline = Instant::now().checked_add(timeout);

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut elapsed_ms = 0u64;
        let mut exit_code = 0;
        let mut stage = Stage::Run;
        let mut executed = Vec::with_capacity(steps.len());

        for step in &steps {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining == Duration::ZERO {
                warn!(stage = ?step.stage, "no time left for next step");
                return Err(ExecError::Timeout {
                    command: step.command.clone(),
                    elapsed_ms,
                    stdout,
                    stderr,
                });
            }

            let result = match self.runner.run(&step.command, &cwd, remaining).await {
                Ok(result) => result,
                Err(ExecError::Timeout {
                    command,
                    elapsed_ms: step_ms,
                    stdout: step_out,
                    stderr: step_err,
                }) => {
                    warn!(stage = ?step.stage, "code step timed out");
                    return Err(ExecError::Timeout {
                        command,
                        elapsed_ms: elapsed_ms + step_ms,
                        stdout: stdout + &step_out,
                        stderr: stderr + &step_err,
                    });
                }
                Err(err) => return Err(err),
            };

            stdout.push_str(&result.stdout);
            stderr.push_str(&result.stderr);
            elapsed_ms += result.execution_time_ms;
            exit_code = result.exit_code;
            stage = step.stage;
            executed.push(step.command.as_str());
            if exit_code != 0 {
                break;
            }
        }

        let temp_file = temp.file_name();
        let command = executed.join(" && ");
        temp.cleanup();

        info!(exit_code, stage = ?stage, elapsed_ms, "code finished");
        Ok(CodeExecutionResult {
            result: ExecutionResult {
                command,
                stdout,
                stderr,
                exit_code,
                execution_time_ms: elapsed_ms,
                working_directory: cwd.display_string(),
            },
            language: language.to_string(),
            code: source.to_string(),
            temp_file,
            stage,
        })
    }
}

fn log_outcome(outcome: &Result<ExecutionResult, ExecError>) {
    match outcome {
        Ok(result) => info!(
            exit_code = result.exit_code,
            elapsed_ms = result.execution_time_ms,
            "execution complete"
        ),
        Err(err) => warn!(code = err.code(), "execution failed: {}", err),
    }
}
