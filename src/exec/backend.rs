// src/exec/backend.rs

//! Pluggable command runner abstraction.
//!
//! The sync components talk to a `CommandRunner` instead of spawning
//! processes themselves. Production uses [`ProcessRunner`]; tests provide a
//! scripted runner that records invocations and returns canned results.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CommandResult, CommandSpec, LAUNCH_FAILURE_EXIT_CODE};

/// Trait abstracting how a command is executed.
///
/// Implementations must never block past `spec.timeout` and must report
/// every failure through the returned [`CommandResult`].
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        spec: CommandSpec,
    ) -> Pin<Box<dyn Future<Output = CommandResult> + Send + '_>>;
}

/// Real runner used in production: one OS process per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        spec: CommandSpec,
    ) -> Pin<Box<dyn Future<Output = CommandResult> + Send + '_>> {
        Box::pin(run_process(spec))
    }
}

/// Run a process to completion or until its timeout elapses.
///
/// On timeout the child is dropped, and `kill_on_drop(true)` makes sure it
/// does not outlive the call.
async fn run_process(spec: CommandSpec) -> CommandResult {
    debug!(cmd = %spec, timeout_secs = spec.timeout.as_secs(), "running command");

    match tokio::time::timeout(spec.timeout, run_process_inner(&spec)).await {
        Ok(Ok(result)) => {
            if !result.success() {
                debug!(
                    program = %spec.program,
                    exit_code = result.exit_code,
                    stderr = %result.stderr.trim(),
                    "command exited non-zero"
                );
            }
            result
        }
        Ok(Err(err)) => {
            warn!(program = %spec.program, error = %err, "command could not be run");
            CommandResult::failed(LAUNCH_FAILURE_EXIT_CODE, format!("{err:#}"))
        }
        Err(_elapsed) => {
            warn!(
                program = %spec.program,
                timeout_secs = spec.timeout.as_secs(),
                "command timed out"
            );
            CommandResult::timed_out(spec.timeout)
        }
    }
}

async fn run_process_inner(spec: &CommandSpec) -> Result<CommandResult> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning '{}'", spec.program))?;

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for '{}'", spec.program))?;

    Ok(CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(LAUNCH_FAILURE_EXIT_CODE),
    })
}
