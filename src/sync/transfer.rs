// src/sync/transfer.rs

use std::sync::LazyLock;

use regex::Regex;
use tracing::{error, info};

use crate::config::SyncConfig;
use crate::exec::{CommandRunner, CommandSpec};

/// Subdirectories of the remote repository that are never copied.
pub const EXCLUDES: &[&str] = &["locks/", "tmp/"];

/// Matches both `Number of files transferred: N` (rsync < 3.1) and
/// `Number of regular files transferred: N` (rsync >= 3.1).
static FILES_TRANSFERRED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Number of (?:regular )?files transferred:\s*([\d,.]+)")
        .expect("static regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    pub success: bool,
    pub files_transferred: u64,
}

impl TransferOutcome {
    pub fn failed() -> Self {
        Self {
            success: false,
            files_transferred: 0,
        }
    }
}

/// The rsync invocation mirroring the remote repository locally.
pub fn transfer_command(cfg: &SyncConfig) -> CommandSpec {
    let rsh = format!(
        "ssh -o BatchMode=yes -o ConnectTimeout={}",
        cfg.timeouts.connect_secs
    );
    CommandSpec::new("rsync", cfg.transfer_timeout())
        .args(["-avz", "--compress-level=6"])
        .arg(format!("--bwlimit={}", cfg.sync.bandwidth_limit))
        .args(["--partial", "--stats"])
        .args(EXCLUDES.iter().map(|e| format!("--exclude={e}")))
        .arg(format!("--rsh={rsh}"))
        .arg(cfg.transfer_source())
        .arg(cfg.transfer_destination())
}

/// Mirror remote → local. A failed copy is reported, never raised.
pub async fn transfer<R: CommandRunner>(runner: &R, cfg: &SyncConfig) -> TransferOutcome {
    let spec = transfer_command(cfg);
    info!(cmd = %spec, "syncing repository data");

    let result = runner.run(spec).await;
    if !result.success() {
        error!(
            exit_code = result.exit_code,
            stderr = %result.stderr.trim(),
            "repository sync failed"
        );
        return TransferOutcome::failed();
    }

    // --stats goes to stdout; older wrappers captured it on stderr.
    let files_transferred = parse_files_transferred(&result.stdout)
        .or_else(|| parse_files_transferred(&result.stderr))
        .unwrap_or(0);
    info!(files_transferred, "transfer finished");

    TransferOutcome {
        success: true,
        files_transferred,
    }
}

/// Extract the files-transferred count from rsync `--stats` output.
pub fn parse_files_transferred(output: &str) -> Option<u64> {
    let caps = FILES_TRANSFERRED.captures(output)?;
    let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
