// src/sync/cleanup.rs

use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::exec::remote::shell_quote;
use crate::exec::{CommandRunner, RemoteShell};

/// Value of `RESTIC_SYNC_CALLER` seen by the remote hook.
pub const SYNC_CALLER: &str = "local-sync-service";

/// One-liner touching the per-day completion marker. Idempotent.
pub fn completion_marker_command() -> &'static str {
    "touch /tmp/restic-sync-complete-$(date +%Y%m%d)"
}

pub fn cleanup_hook_command(cfg: &SyncConfig) -> Option<String> {
    cfg.cleanup_hook_path()
        .map(|hook| format!("RESTIC_SYNC_CALLER={SYNC_CALLER} {}", shell_quote(&hook)))
}

/// Tell the remote side a sync completed and run its maintenance hook.
///
/// Best effort: failures are logged at warn and never change the outcome of
/// the cycle.
pub async fn trigger_cleanup<R: CommandRunner>(shell: &RemoteShell<R>, cfg: &SyncConfig) {
    let marker = shell
        .execute(completion_marker_command(), cfg.remote_command_timeout())
        .await;
    if !marker.success() {
        warn!(
            exit_code = marker.exit_code,
            stderr = %marker.stderr.trim(),
            "could not write remote completion marker (non-critical)"
        );
    }

    let Some(hook) = cleanup_hook_command(cfg) else {
        debug!("no remote cleanup hook configured");
        return;
    };

    let result = shell.execute(&hook, cfg.cleanup_timeout()).await;
    if result.success() {
        info!("remote cleanup completed successfully");
    } else {
        warn!(
            exit_code = result.exit_code,
            stderr = %result.stderr.trim(),
            "remote cleanup failed (non-critical)"
        );
    }
}
