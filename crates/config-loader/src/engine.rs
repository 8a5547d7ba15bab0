//! Execution engine settings: workspace, shell, timeouts and output limits.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::{ConfigError, ConfigManager};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 3600;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub workspace_root: PathBuf,
    pub shell: String,
    pub default_timeout_seconds: u64,
    pub max_timeout_seconds: u64,
    pub max_output_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("./workspace"),
            shell: "/bin/sh".to_string(),
            default_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl EngineConfig {
    /// `engine.json` from the manager's config dir (or schema defaults), then
    /// environment overrides, then validation.
    pub fn load(manager: &ConfigManager) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = manager.load("engine")?;
        let cfg = cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Same as [`EngineConfig::load`] but from an explicit file.
    pub fn load_file(manager: &ConfigManager, path: &Path) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = manager.load_file("engine", path)?;
        let cfg = cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(root) = env_value("SHELLIDE_WORKSPACE") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(shell) = env_value("SHELLIDE_SHELL") {
            self.shell = shell;
        }
        if let Some(raw) = env_value("SHELLIDE_DEFAULT_TIMEOUT") {
            self.default_timeout_seconds = parse_seconds("SHELLIDE_DEFAULT_TIMEOUT", &raw)?;
        }
        if let Some(raw) = env_value("SHELLIDE_MAX_TIMEOUT") {
            self.max_timeout_seconds = parse_seconds("SHELLIDE_MAX_TIMEOUT", &raw)?;
        }
        if let Some(raw) = env_value("SHELLIDE_MAX_OUTPUT_BYTES") {
            self.max_output_bytes = raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: "SHELLIDE_MAX_OUTPUT_BYTES".to_string(),
                message: format!("'{}' is not a byte count", raw),
            })?;
        }
        debug!(config = ?self, "engine config after env overrides");
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(invalid("workspaceRoot", "must not be empty"));
        }
        if self.shell.trim().is_empty() {
            return Err(invalid("shell", "must not be empty"));
        }
        if self.default_timeout_seconds == 0 {
            return Err(invalid("defaultTimeoutSeconds", "must be at least 1"));
        }
        if self.max_timeout_seconds < self.default_timeout_seconds {
            return Err(invalid(
                "maxTimeoutSeconds",
                "must not be lower than defaultTimeoutSeconds",
            ));
        }
        if self.max_output_bytes == 0 {
            return Err(invalid("maxOutputBytes", "must be at least 1"));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_timeout_seconds)
    }

    /// Caller-requested seconds clamped to the maximum; absent or zero means default.
    pub fn effective_timeout(&self, requested_seconds: Option<u64>) -> Duration {
        match requested_seconds {
            Some(secs) if secs > 0 => Duration::from_secs(secs.min(self.max_timeout_seconds)),
            _ => self.default_timeout(),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accepts plain seconds (`90`) or humantime strings (`90s`, `5m`, `1h 30m`).
fn parse_seconds(field: &str, raw: &str) -> Result<u64, ConfigError> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(raw)
        .map(|d| d.as_secs())
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("'{}': {}", raw, e),
        })
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
