// src/exec/mod.rs

//! Process execution layer.
//!
//! Every external program this tool touches (`ssh`, `rsync`, `restic`) is
//! launched through a [`CommandRunner`], and every run comes back as a
//! [`CommandResult`]. Nothing in here returns `Err`: spawn failures, non-zero
//! exits and timeouts all become a non-zero `exit_code` plus an explanatory
//! `stderr`, and callers branch on [`CommandResult::success`].
//!
//! - [`backend`] provides the `CommandRunner` trait and the production
//!   [`ProcessRunner`] built on `tokio::process::Command`.
//! - [`remote`] wraps a runner into a [`RemoteShell`] that executes shell
//!   one-liners on the backup host over SSH.

use std::fmt;
use std::time::Duration;

pub mod backend;
pub mod remote;

pub use backend::{CommandRunner, ProcessRunner};
pub use remote::RemoteShell;

/// Exit code reported when a command exceeds its timeout (same as `timeout(1)`).
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the process could not be spawned or waited on,
/// or was killed by a signal.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;

/// Uniform result of running a command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self::failed(
            TIMEOUT_EXIT_CODE,
            format!("command timed out after {} seconds", timeout.as_secs()),
        )
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A fully-specified program invocation.
///
/// Arguments are passed to the program directly, never through a local
/// shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The whole invocation as one string (args joined by spaces).
    /// Used for logging and for matching in test doubles.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={value} ")?;
        }
        f.write_str(&self.command_line())
    }
}
