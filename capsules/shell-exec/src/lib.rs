//! Sandboxed command and code execution.
//!
//! [`ExecutionFacade`] is the entry point: it classifies command lines with
//! [`wards::CommandPolicy`], confines working directories with
//! [`wards::PathSandbox`], turns code snippets into toolchain plans with
//! [`LanguageDispatcher`] and runs everything through a [`ProcessRunner`].

mod capture;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod facade;
pub mod toolbox;
pub mod types;

pub use dispatch::{LanguageDispatcher, PlanStep, Platform, PreparedCode, TempSourceFile};
pub use error::ExecError;
pub use executor::{ProcessExecutor, ProcessRunner};
pub use facade::ExecutionFacade;
pub use types::{CodeExecutionResult, ExecutionRequest, ExecutionResult, ExecutionTarget, Stage};
