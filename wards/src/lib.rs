//! Execution guards: command classification and working-directory confinement.

pub mod config;
pub mod policy;
pub mod sandbox;

pub use config::PolicyConfig;
pub use policy::{CommandPolicy, PolicyVerdict};
pub use sandbox::{PathSandbox, ResolvedDir};
