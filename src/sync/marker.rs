// src/sync/marker.rs

//! Advisory marker file shared with the remote backup job.
//!
//! Creating and removing the marker are two separate SSH round-trips with a
//! probe before them, so two writers racing for the repository can both see
//! it free. The marker is cooperative, not mutually exclusive.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::exec::remote::shell_quote;
use crate::exec::{CommandRunner, RemoteShell};

pub struct Marker<'a, R> {
    shell: &'a RemoteShell<R>,
    path: String,
    timeout: Duration,
}

impl<'a, R: CommandRunner> Marker<'a, R> {
    pub fn new(shell: &'a RemoteShell<R>, cfg: &SyncConfig) -> Self {
        Self {
            shell,
            path: cfg.marker_path(),
            timeout: cfg.remote_command_timeout(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Create the marker. A failure is logged and otherwise ignored.
    pub async fn acquire(&self) -> bool {
        let result = self
            .shell
            .execute(&format!("touch {}", shell_quote(&self.path)), self.timeout)
            .await;
        if result.success() {
            debug!(marker = %self.path, "sync marker created");
        } else {
            warn!(
                marker = %self.path,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "could not create sync marker; continuing without it"
            );
        }
        result.success()
    }

    /// Remove the marker, whether or not we created it.
    pub async fn release(&self) -> bool {
        let result = self
            .shell
            .execute(&format!("rm -f {}", shell_quote(&self.path)), self.timeout)
            .await;
        if result.success() {
            debug!(marker = %self.path, "sync marker removed");
        } else {
            warn!(
                marker = %self.path,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "could not remove sync marker"
            );
        }
        result.success()
    }

    /// Run `body` with the marker held.
    ///
    /// `release` runs exactly once after `body` returns, whatever it returns.
    /// If `body` panics or the returned future is dropped before completion,
    /// the marker stays behind until the next cycle's release.
    pub async fn hold<F>(&self, body: F) -> F::Output
    where
        F: Future,
    {
        self.acquire().await;
        let output = body.await;
        self.release().await;
        output
    }
}
