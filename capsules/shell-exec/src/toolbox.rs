//! Host-facing helpers built on the facade: host queries, package installs and
//! dev-server command presets.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::ExecError;
use crate::executor::ProcessRunner;
use crate::facade::ExecutionFacade;
use crate::types::ExecutionResult;

/// Upper bound for a single host query in [`system_info`].
const QUERY_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub system: String,
    pub machine: String,
    pub family: String,
    pub shell: String,
    pub workspace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_info: Option<String>,
}

/// Static host facts plus whatever the host queries could report.
pub async fn system_info<R: ProcessRunner>(facade: &ExecutionFacade<R>) -> SystemInfo {
    let windows = cfg!(windows);
    let linux = cfg!(target_os = "linux");

    let os_version = host_query(facade, if windows { "ver" } else { "uname -a" }).await;
    let disk_space = host_query(facade, if windows { "dir" } else { "df -h ." }).await;
    let (memory, cpu_info) = if linux {
        (host_query(facade, "free -h").await, host_query(facade, "lscpu").await)
    } else {
        (None, None)
    };

    SystemInfo {
        system: std::env::consts::OS.to_string(),
        machine: std::env::consts::ARCH.to_string(),
        family: std::env::consts::FAMILY.to_string(),
        shell: facade.config().shell.clone(),
        workspace: facade.workspace().root().display_string(),
        os_version,
        disk_space,
        memory,
        cpu_info,
    }
}

async fn host_query<R: ProcessRunner>(facade: &ExecutionFacade<R>, command: &str) -> Option<String> {
    match facade
        .execute_command(command, None, Some(QUERY_TIMEOUT_SECONDS))
        .await
    {
        Ok(result) if result.success() => {
            let out = result.stdout.trim();
            (!out.is_empty()).then(|| out.to_string())
        }
        Ok(result) => {
            debug!(command, exit_code = result.exit_code, "host query exited non-zero");
            None
        }
        Err(err) => {
            debug!(command, "host query failed: {}", err);
            None
        }
    }
}

/// Install command prefix for a package manager on this host, if it has one.
pub fn install_command(manager: &str) -> Option<&'static str> {
    match manager {
        "pip" => Some("pip install"),
        "pip3" => Some("pip3 install"),
        "npm" => Some("npm install"),
        "yarn" => Some("yarn add"),
        "cargo" => Some("cargo install"),
        "go" => Some("go install"),
        "apt" if cfg!(target_os = "linux") => Some("apt install -y"),
        "brew" if cfg!(target_os = "macos") => Some("brew install"),
        _ => None,
    }
}

/// Letters and digits, optionally separated by `-`, `_` or `.`; never a flag.
pub fn is_valid_package_name(name: &str) -> bool {
    let stripped: String = name.chars().filter(|c| !matches!(c, '-' | '_' | '.')).collect();
    !stripped.is_empty() && !name.starts_with('-') && stripped.chars().all(char::is_alphanumeric)
}

#[instrument(skip(facade))]
pub async fn install_package<R: ProcessRunner>(
    facade: &ExecutionFacade<R>,
    manager: &str,
    package: &str,
) -> Result<ExecutionResult, ExecError> {
    let prefix = install_command(manager).ok_or_else(|| ExecError::InvalidRequest {
        message: format!("Package manager '{}' not supported on this system", manager),
    })?;
    if !is_valid_package_name(package) {
        return Err(ExecError::InvalidRequest {
            message: format!("Invalid package name '{}'", package),
        });
    }

    let command = format!("{} {}", prefix, package);
    info!(%command, "installing package");
    facade
        .execute_command(&command, None, Some(facade.config().max_timeout_seconds))
        .await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedServer {
    pub command: String,
    pub port: Option<u16>,
    pub preset: bool,
}

/// Resolves a dev-server preset to its command line. Never spawns; anything
/// that is not a preset must still pass the command policy.
pub fn server_command<R: ProcessRunner>(
    facade: &ExecutionFacade<R>,
    kind: &str,
    port: Option<u16>,
) -> Result<PreparedServer, ExecError> {
    if let Some(command) = preset_command(kind, port) {
        return Ok(PreparedServer {
            command,
            port,
            preset: true,
        });
    }

    let verdict = facade.classify(kind);
    if !verdict.is_allowed() {
        return Err(ExecError::PolicyViolation { verdict });
    }
    Ok(PreparedServer {
        command: kind.trim().to_string(),
        port,
        preset: false,
    })
}

fn preset_command(kind: &str, port: Option<u16>) -> Option<String> {
    let command = match kind {
        "python" => format!("python -m http.server {}", port.unwrap_or(8000)),
        "node" | "react" => match port {
            Some(p) => format!("npm start -- --port {}", p),
            None => "npm start".to_string(),
        },
        "vue" => match port {
            Some(p) => format!("npm run serve -- --port {}", p),
            None => "npm run serve".to_string(),
        },
        "angular" => match port {
            Some(p) => format!("ng serve --port {}", p),
            None => "ng serve".to_string(),
        },
        "django" => match port {
            Some(p) => format!("python manage.py runserver 0.0.0.0:{}", p),
            None => "python manage.py runserver".to_string(),
        },
        "flask" => format!(
            "python -m flask run --host=0.0.0.0 --port={}",
            port.unwrap_or(5000)
        ),
        "express" => "npm start".to_string(),
        _ => return None,
    };
    Some(command)
}
