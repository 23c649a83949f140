//! Subprocess execution seam.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::invocation::RunnerInvocation;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stderr followed by stdout, for signature matching.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stderr, self.stdout)
    }
}

/// Runs a shaped invocation to completion.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, invocation: &RunnerInvocation) -> io::Result<CommandOutput>;
}

/// Executes with `tokio::process`, standard streams piped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandExecutor;

#[async_trait]
impl CommandExecutor for TokioCommandExecutor {
    async fn run(&self, invocation: &RunnerInvocation) -> io::Result<CommandOutput> {
        debug!(
            program = %invocation.program,
            args = ?invocation.args,
            cwd = %invocation.cwd.display(),
            "spawning test runner"
        );

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
