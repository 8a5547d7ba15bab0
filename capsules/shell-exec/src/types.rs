use serde::{Deserialize, Serialize};

/// What to run: a shell command line, or source code in a named language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionTarget {
    Command { command: String },
    Code { language: String, source: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    #[serde(flatten)]
    pub target: ExecutionTarget,
    /// Commands only; code always runs at the workspace root.
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl ExecutionRequest {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            target: ExecutionTarget::Command {
                command: command.into(),
            },
            working_directory: None,
            timeout_seconds: None,
        }
    }

    pub fn code(language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: ExecutionTarget::Code {
                language: language.into(),
                source: source.into(),
            },
            working_directory: None,
            timeout_seconds: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }
}

/// The value handed back to collaborators. Output is best-effort and present
/// even when the exit code is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub execution_time_ms: u64,
    pub working_directory: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Which step of a toolchain invocation produced a reported outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExecutionResult {
    #[serde(flatten)]
    pub result: ExecutionResult,
    pub language: String,
    pub code: String,
    pub temp_file: String,
    pub stage: Stage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_camel_case() {
        let result = ExecutionResult {
            command: "ls".into(),
            stdout: "a\n".into(),
            stderr: String::new(),
            exit_code: 0,
            execution_time_ms: 12,
            working_directory: "/ws".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exitCode"], 0);
        assert_eq!(json["executionTimeMs"], 12);
        assert_eq!(json["workingDirectory"], "/ws");
    }

    #[test]
    fn code_result_flattens_and_echoes() {
        let result = CodeExecutionResult {
            result: ExecutionResult {
                command: "python3 x.py".into(),
                stdout: "2\n".into(),
                stderr: String::new(),
                exit_code: 0,
                execution_time_ms: 30,
                working_directory: "/ws".into(),
            },
            language: "python".into(),
            code: "print(1+1)".into(),
            temp_file: "exec-abc.py".into(),
            stage: Stage::Run,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stdout"], "2\n");
        assert_eq!(json["language"], "python");
        assert_eq!(json["tempFile"], "exec-abc.py");
        assert_eq!(json["stage"], "run");
    }

    #[test]
    fn request_deserializes_either_target() {
        let req: ExecutionRequest =
            serde_json::from_str(r#"{"command":"ls","workingDirectory":"src"}"#).unwrap();
        assert_eq!(req, ExecutionRequest::command("ls").in_dir("src"));

        let req: ExecutionRequest =
            serde_json::from_str(r#"{"language":"python","source":"print(1)","timeoutSeconds":5}"#)
                .unwrap();
        assert_eq!(
            req,
            ExecutionRequest::code("python", "print(1)").with_timeout_seconds(5)
        );
    }
}
