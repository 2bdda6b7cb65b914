// src/sync/verify.rs

//! Local integrity spot-check.
//!
//! `restic check --read-data-subset` reads only a sample of pack files, so a
//! pass means "the index is consistent and the sampled data is intact", not
//! that every blob in the replica is readable. A full `--read-data` scan
//! does not fit the poll interval.

use tracing::{error, info};

use crate::config::SyncConfig;
use crate::exec::{CommandRunner, CommandSpec};

pub fn verify_command(cfg: &SyncConfig) -> CommandSpec {
    CommandSpec::new("restic", cfg.verify_timeout())
        .arg("check")
        .arg(format!("--read-data-subset={}", cfg.sync.verify_subset))
        .env(
            "RESTIC_REPOSITORY",
            cfg.local.repo_path.to_string_lossy().into_owned(),
        )
        .env(
            "RESTIC_PASSWORD_FILE",
            cfg.local.password_file.to_string_lossy().into_owned(),
        )
}

/// True only if the consistency check exits 0.
pub async fn verify<R: CommandRunner>(runner: &R, cfg: &SyncConfig) -> bool {
    info!(subset = %cfg.sync.verify_subset, "verifying local repository integrity");

    let result = runner.run(verify_command(cfg)).await;
    if result.success() {
        info!("repository verification successful");
        true
    } else {
        error!(
            exit_code = result.exit_code,
            stderr = %result.stderr.trim(),
            "repository verification failed"
        );
        false
    }
}
