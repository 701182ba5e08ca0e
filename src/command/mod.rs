//! External command execution
//!
//! A single raw invocation with captured output. Retry policy lives in
//! the applier, not here; elevation denial surfaces as a non-zero exit
//! or an `Err`, never a panic.

pub mod netsetup;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

/// Captured result of one external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Capability for running external commands
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    /// Run `program` with `args` to completion, capturing stdout,
    /// stderr and the exit status. Blocks only the calling task.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands as real OS processes
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", program))?;

        Ok(CommandOutput {
            // Signal-terminated processes have no exit code
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
