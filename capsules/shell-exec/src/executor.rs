//! Child-process execution with a bounded lifetime.
//!
//! Each call owns exactly one shell process. On POSIX the shell leads its own
//! process group so a timeout, an early return, or a dropped future can take
//! down everything the command started, not just the shell itself.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use config_loader::EngineConfig;
use tokio::process::{Child, Command};
use tracing::{debug, info, instrument, warn};
use wards::ResolvedDir;

use crate::capture::OutputCapture;
use crate::error::ExecError;
use crate::types::ExecutionResult;

/// How long pipe readers may keep draining after the process is gone.
const PIPE_GRACE: Duration = Duration::from_secs(2);

/// Seam between the facade and real process creation.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        cwd: &ResolvedDir,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError>;
}

#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    shell: String,
    max_output_bytes: usize,
}

impl ProcessExecutor {
    pub fn new(shell: impl Into<String>, max_output_bytes: usize) -> Self {
        Self {
            shell: shell.into(),
            max_output_bytes,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.shell.clone(), config.max_output_bytes)
    }

    fn build_command(&self, command: &str, cwd: &Path) -> Command {
        // cmd.exe parses its own command line; MSVC argv escaping of the inner
        // quotes would reach the program as literal `\"`.
        #[cfg(windows)]
        let mut std_cmd = {
            use std::os::windows::process::CommandExt;
            let mut c = std::process::Command::new("cmd");
            c.arg("/C").raw_arg(command);
            c
        };
        #[cfg(not(windows))]
        let mut std_cmd = {
            let mut c = std::process::Command::new(&self.shell);
            c.arg("-c").arg(command);
            c
        };

        std_cmd
            .current_dir(cwd)
            .env("PWD", cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ProcessRunner for ProcessExecutor {
    #[instrument(skip(self, cwd), fields(cwd = %cwd))]
    async fn run(
        &self,
        command: &str,
        cwd: &ResolvedDir,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        if is_builtin_pwd(command) {
            debug!("answering pwd without spawning");
            return Ok(ExecutionResult {
                command: command.to_string(),
                stdout: cwd.display_string(),
                stderr: String::new(),
                exit_code: 0,
                execution_time_ms: 0,
                working_directory: cwd.display_string(),
            });
        }

        let mut cmd = self.build_command(command, cwd.as_path());
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let mut group = GroupGuard::new(child.id());

        let stdout = OutputCapture::spawn(child.stdout.take(), self.max_output_bytes);
        let stderr = OutputCapture::spawn(child.stderr.take(), self.max_output_bytes);

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let elapsed = start.elapsed();
                // The shell is reaped, but its pgid stays reserved while any
                // background job still lives in the group. Once the group is empty
                // the id could be reissued before this signal; ESRCH is the common case.
                group.kill();
                let stdout = stdout.finish(PIPE_GRACE).await;
                let stderr = stderr.finish(PIPE_GRACE).await;
                let exit_code = exit_code(&status);
                info!(exit_code, elapsed_ms = millis(elapsed), "command finished");
                Ok(ExecutionResult {
                    command: command.to_string(),
                    stdout,
                    stderr,
                    exit_code,
                    execution_time_ms: millis(elapsed),
                    working_directory: cwd.display_string(),
                })
            }
            Ok(Err(err)) => {
                group.kill();
                reclaim(&mut child).await;
                Err(ExecError::io("Failed waiting for child process", err))
            }
            Err(_) => {
                group.kill();
                reclaim(&mut child).await;
                let elapsed = start.elapsed();
                let stdout = stdout.finish(PIPE_GRACE).await;
                let stderr = stderr.finish(PIPE_GRACE).await;
                warn!(?timeout, "command timed out; process terminated");
                Err(ExecError::Timeout {
                    command: command.to_string(),
                    elapsed_ms: millis(elapsed),
                    stdout,
                    stderr,
                })
            }
        }
    }
}

/// `pwd` is answered from the resolved directory; no shell needed.
pub fn is_builtin_pwd(command: &str) -> bool {
    command.trim().eq_ignore_ascii_case("pwd")
}

async fn reclaim(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        debug!("start_kill after exit: {}", err);
    }
    if let Err(err) = child.wait().await {
        warn!("failed to reap child process: {}", err);
    }
}

fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Kills the child's whole process group when asked, and again on drop so a
/// cancelled execution cannot leave grandchildren behind.
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn kill(&mut self) {
        if let Some(pid) = self.pid.take() {
            signal_group(pid);
        }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn signal_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // ESRCH just means the group is already empty.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            pgid,
            "killpg: {}",
            std::io::Error::last_os_error()
        );
    }
}

// Without process groups the shell itself is reclaimed via kill_on_drop/start_kill.
#[cfg(not(unix))]
fn signal_group(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pwd_detection_is_exact() {
        assert!(is_builtin_pwd("pwd"));
        assert!(is_builtin_pwd("  PWD \n"));
        assert!(!is_builtin_pwd("pwd -P"));
        assert!(!is_builtin_pwd("echo pwd"));
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
    }

    #[cfg(unix)]
    #[test]
    fn signalled_exit_maps_to_shell_convention() {
        use std::os::unix::process::ExitStatusExt;
        let status = ExitStatus::from_raw(9); // terminated by SIGKILL
        assert_eq!(exit_code(&status), 137);
        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(exit_code(&status), 3);
    }
}
