use thiserror::Error;
use wards::PolicyVerdict;

/// Every way an execution can end without an [`ExecutionResult`](crate::ExecutionResult).
///
/// A command that runs and exits non-zero is not an error; it is a result.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Command not allowed for security reasons: {reason}", reason = .verdict.reason())]
    PolicyViolation { verdict: PolicyVerdict },

    #[error("Language '{language}' not supported")]
    UnsupportedLanguage { language: String },

    #[error("Command timed out after {elapsed_ms} ms: {command}")]
    Timeout {
        command: String,
        elapsed_ms: u64,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

impl ExecError {
    pub fn code(&self) -> &'static str {
        match self {
            ExecError::PolicyViolation { .. } => "EXEC_POLICY_VIOLATION",
            ExecError::UnsupportedLanguage { .. } => "EXEC_UNSUPPORTED_LANGUAGE",
            ExecError::Timeout { .. } => "EXEC_TIMEOUT",
            ExecError::Spawn { .. } => "EXEC_SPAWN_FAILED",
            ExecError::Io { .. } => "EXEC_IO_ERROR",
            ExecError::InvalidRequest { .. } => "EXEC_INVALID_REQUEST",
        }
    }

    /// Rejections the caller caused, as opposed to runtime failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ExecError::PolicyViolation { .. }
                | ExecError::UnsupportedLanguage { .. }
                | ExecError::InvalidRequest { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout { .. })
    }

    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        ExecError::Io {
            message: format!("{}: {}", context, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_violation_message_carries_reason() {
        let err = ExecError::PolicyViolation {
            verdict: PolicyVerdict::BlockedCommand("sudo".into()),
        };
        assert!(err.to_string().contains("'sudo' is blocked"));
        assert_eq!(err.code(), "EXEC_POLICY_VIOLATION");
        assert!(err.is_rejection());
        assert!(!err.is_timeout());
    }

    #[test]
    fn timeout_is_not_a_rejection() {
        let err = ExecError::Timeout {
            command: "sleep 5".into(),
            elapsed_ms: 1000,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(err.is_timeout());
        assert!(!err.is_rejection());
        assert_eq!(err.code(), "EXEC_TIMEOUT");
    }
}
