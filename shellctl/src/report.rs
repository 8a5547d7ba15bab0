//! JSON on stdout for every outcome, with exit codes scripts can branch on.

use std::path::Path;

use anyhow::Result;
use capsules_shell_exec::ExecError;
use config_loader::ConfigError;
use serde::Serialize;
use serde_json::{json, Value};
use wards::PolicyVerdict;

/// Policy violation, unsupported language or invalid request.
pub const EXIT_REJECTED: i32 = 2;
/// Same convention as coreutils `timeout`.
pub const EXIT_TIMEOUT: i32 = 124;
pub const EXIT_FAILED: i32 = 1;

pub fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn outcome<T: Serialize>(result: Result<T, ExecError>) -> Result<i32> {
    match result {
        Ok(value) => emit(&value).map(|_| 0),
        Err(err) => failure(&err),
    }
}

pub fn failure(err: &ExecError) -> Result<i32> {
    emit(&error_body(err))?;
    Ok(exit_status(err))
}

pub fn verdict(command: &str, verdict: PolicyVerdict) -> Result<i32> {
    let status = if verdict.is_allowed() { 0 } else { EXIT_REJECTED };
    emit(&json!({
        "command": command,
        "allowed": verdict.is_allowed(),
        "reason": verdict.reason(),
        "policy": verdict,
    }))?;
    Ok(status)
}

pub fn config_validation(file: &Path, outcome: Result<(), ConfigError>) -> Result<i32> {
    let file = file.display().to_string();
    match outcome {
        Ok(()) => {
            emit(&json!({ "file": file, "valid": true }))?;
            Ok(0)
        }
        Err(ConfigError::ValidationFailed { errors }) => {
            let errors: Vec<Value> = errors
                .iter()
                .map(|e| json!({ "pointer": e.json_pointer, "message": e.message }))
                .collect();
            emit(&json!({ "file": file, "valid": false, "errors": errors }))?;
            Ok(EXIT_FAILED)
        }
        Err(err) => {
            emit(&json!({ "file": file, "valid": false, "error": err.to_string() }))?;
            Ok(EXIT_FAILED)
        }
    }
}

fn error_body(err: &ExecError) -> Value {
    let mut body = json!({ "error": err.to_string(), "code": err.code() });
    match err {
        ExecError::PolicyViolation { verdict } => {
            body["policy"] = serde_json::to_value(verdict).unwrap_or(Value::Null);
        }
        ExecError::Timeout {
            command,
            elapsed_ms,
            stdout,
            stderr,
        } => {
            body["command"] = json!(command);
            body["executionTimeMs"] = json!(elapsed_ms);
            body["stdout"] = json!(stdout);
            body["stderr"] = json!(stderr);
        }
        _ => {}
    }
    body
}

fn exit_status(err: &ExecError) -> i32 {
    if err.is_rejection() {
        EXIT_REJECTED
    } else if err.is_timeout() {
        EXIT_TIMEOUT
    } else {
        EXIT_FAILED
    }
}
