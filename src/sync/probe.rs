// src/sync/probe.rs

use tracing::{debug, error, warn};

use crate::config::SyncConfig;
use crate::exec::remote::shell_quote;
use crate::exec::{CommandRunner, RemoteShell};

/// Printed by the marker query when the marker file exists.
pub const BUSY_TOKEN: &str = "BACKUP_RUNNING";
/// Printed by the marker query when it does not.
pub const READY_TOKEN: &str = "BACKUP_READY";

/// Snapshot of the remote repository, produced fresh every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteState {
    /// The marker file exists: a backup (or another sync) owns the repository.
    pub busy: bool,
    /// Unix mtime of the repository identity file, `0` if unknown.
    pub modified_at: i64,
    pub size_bytes: u64,
}

/// Shell one-liner that prints [`BUSY_TOKEN`] or [`READY_TOKEN`].
pub fn marker_query(cfg: &SyncConfig) -> String {
    format!(
        "test -f {} && echo {BUSY_TOKEN} || echo {READY_TOKEN}",
        shell_quote(&cfg.marker_path())
    )
}

/// Shell one-liner that prints `"<mtime> <size>"`, or `"0 0"` if the
/// identity file cannot be stat'ed.
pub fn stat_query(cfg: &SyncConfig) -> String {
    format!(
        "stat -c '%Y %s' {} 2>/dev/null || echo '0 0'",
        shell_quote(&cfg.identity_file())
    )
}

/// Query marker presence and repository metadata.
///
/// Returns `None` only when the marker query itself fails to run; the caller
/// must then abort the cycle rather than guess. A failed stat is not fatal
/// and yields `(0, 0)`.
pub async fn probe<R: CommandRunner>(
    shell: &RemoteShell<R>,
    cfg: &SyncConfig,
) -> Option<RemoteState> {
    let timeout = cfg.remote_command_timeout();

    let marker = shell.execute(&marker_query(cfg), timeout).await;
    if !marker.success() {
        error!(
            exit_code = marker.exit_code,
            stderr = %marker.stderr.trim(),
            "failed to check remote backup status"
        );
        return None;
    }
    let busy = marker.stdout.lines().any(|l| l.trim() == BUSY_TOKEN);

    let stat = shell.execute(&stat_query(cfg), timeout).await;
    let (modified_at, size_bytes) = if stat.success() {
        parse_stat_output(&stat.stdout)
    } else {
        warn!(
            exit_code = stat.exit_code,
            stderr = %stat.stderr.trim(),
            "could not get repository stats; treating as not yet sized"
        );
        (0, 0)
    };

    let state = RemoteState {
        busy,
        modified_at,
        size_bytes,
    };
    debug!(?state, "probed remote repository");
    Some(state)
}

/// Parse `"<mtime> <size>"`, defaulting each missing or malformed field to 0.
pub fn parse_stat_output(stdout: &str) -> (i64, u64) {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut parts = line.split_whitespace();
    let mtime = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let size = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (mtime, size)
}
