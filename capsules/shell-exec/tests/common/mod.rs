#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use capsules_shell_exec::{ExecError, ExecutionFacade, ExecutionResult, ProcessRunner};
use config_loader::EngineConfig;
use wards::{PolicyConfig, ResolvedDir};

#[derive(Debug, Clone)]
pub struct SpawnRecord {
    pub command: String,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

/// Records every spawn request and answers with a canned outcome.
pub struct SpyRunner {
    calls: Mutex<Vec<SpawnRecord>>,
    respond: Box<dyn Fn(&str) -> Result<ExecutionResult, ExecError> + Send + Sync>,
}

impl SpyRunner {
    pub fn ok() -> Self {
        Self::with(|command| Ok(result(command, "spy\n", 0)))
    }

    pub fn with<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Result<ExecutionResult, ExecError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn calls(&self) -> Vec<SpawnRecord> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for SpyRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &ResolvedDir,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        self.calls.lock().unwrap().push(SpawnRecord {
            command: command.to_string(),
            cwd: cwd.as_path().to_path_buf(),
            timeout,
        });
        (self.respond)(command).map(|mut r| {
            r.working_directory = cwd.display_string();
            r
        })
    }
}

pub fn result(command: &str, stdout: &str, exit_code: i32) -> ExecutionResult {
    ExecutionResult {
        command: command.to_string(),
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code,
        execution_time_ms: 5,
        working_directory: String::new(),
    }
}

pub fn engine_config(root: &std::path::Path) -> EngineConfig {
    EngineConfig {
        workspace_root: root.to_path_buf(),
        default_timeout_seconds: 30,
        max_timeout_seconds: 120,
        ..EngineConfig::default()
    }
}

pub fn spy_facade(root: &std::path::Path, spy: SpyRunner) -> ExecutionFacade<SpyRunner> {
    ExecutionFacade::new(engine_config(root), PolicyConfig::default(), spy).unwrap()
}

/// Files the dispatcher left in the workspace.
pub fn leftover_sources(root: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(root)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("exec-"))
        .collect()
}

pub fn tool_available(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
