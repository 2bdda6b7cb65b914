// src/exec/remote.rs

//! Remote command execution over SSH.

use std::time::Duration;

use tracing::debug;

use super::{CommandResult, CommandRunner, CommandSpec};

/// Executes shell one-liners on the backup host.
///
/// The remote side interprets `command` with the login shell, so `&&`,
/// `||` and `$(...)` work as written.
#[derive(Debug, Clone)]
pub struct RemoteShell<R> {
    runner: R,
    target: String,
    connect_timeout: Duration,
}

impl<R: CommandRunner> RemoteShell<R> {
    /// `target` is the `user@host` SSH destination.
    pub fn new(runner: R, target: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            runner,
            target: target.into(),
            connect_timeout,
        }
    }

    /// Underlying runner, for local commands that share its behaviour.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The `ssh` invocation that runs `command` remotely.
    pub fn command_spec(&self, command: &str, timeout: Duration) -> CommandSpec {
        CommandSpec::new("ssh", timeout)
            .args(["-o", "BatchMode=yes"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout.as_secs()))
            .arg(&self.target)
            .arg(command)
    }

    /// Run `command` on the remote host. Never returns an error; unreachable
    /// hosts, auth failures and timeouts all surface as a non-zero result.
    pub async fn execute(&self, command: &str, timeout: Duration) -> CommandResult {
        debug!(host = %self.target, command, "remote exec");
        self.runner.run(self.command_spec(command, timeout)).await
    }
}

/// Quote `value` for a POSIX shell, so remote paths with spaces or quotes
/// survive the remote login shell.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:@%=,".contains(c));
    if safe {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
