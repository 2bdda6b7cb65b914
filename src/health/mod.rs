// src/health/mod.rs

//! Passive health observer.
//!
//! Reads only what any outside process could read: the log file's mtime,
//! the local replica on disk and `restic snapshots`. It never looks at the
//! supervisor's in-memory state.

pub mod server;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::debug;

use crate::config::SyncConfig;
use crate::exec::{CommandRunner, CommandSpec};
use crate::fs::FileSystem;

pub use server::{router, serve, HealthState};

/// Liveness derived from log activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub healthy: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryStatus {
    Available,
    Missing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryInfo {
    pub status: RepositoryStatus,
    pub size: u64,
    pub snapshots: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Healthy iff `log_file` exists and was written within `stale_after`.
pub fn service_health(
    fs: &dyn FileSystem,
    log_file: Option<&Path>,
    stale_after: Duration,
    now: SystemTime,
) -> ServiceHealth {
    let Some(log_file) = log_file else {
        return ServiceHealth {
            healthy: false,
            message: "No log file configured".to_string(),
        };
    };
    if !fs.exists(log_file) {
        return ServiceHealth {
            healthy: false,
            message: "No log file found".to_string(),
        };
    }

    match fs.modified(log_file) {
        Ok(modified) => {
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > stale_after {
                ServiceHealth {
                    healthy: false,
                    message: format!("Log file is {} seconds old", age.as_secs()),
                }
            } else {
                ServiceHealth {
                    healthy: true,
                    message: "Service healthy".to_string(),
                }
            }
        }
        Err(err) => ServiceHealth {
            healthy: false,
            message: format!("Health check error: {err}"),
        },
    }
}

/// Total size of all regular files below `root`.
///
/// Symlinked directories are not descended into, so a link loop inside the
/// replica cannot make the walk recurse.
pub fn directory_size(fs: &dyn FileSystem, root: &Path) -> Result<u64> {
    let mut total = 0;
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs.read_dir(&dir)? {
            if fs.is_dir(&entry) {
                if fs.is_symlink(&entry) {
                    debug!(path = ?entry, "skipping symlinked directory");
                    continue;
                }
                pending.push(entry);
            } else if fs.is_file(&entry) {
                total += fs.file_size(&entry)?;
            }
        }
    }
    Ok(total)
}

/// `restic snapshots --json` against the local replica.
pub fn snapshots_command(cfg: &SyncConfig) -> CommandSpec {
    CommandSpec::new("restic", Duration::from_secs(30))
        .args(["snapshots", "--json"])
        .env(
            "RESTIC_REPOSITORY",
            cfg.local.repo_path.to_string_lossy().into_owned(),
        )
        .env(
            "RESTIC_PASSWORD_FILE",
            cfg.local.password_file.to_string_lossy().into_owned(),
        )
}

/// Number of snapshots, or 0 when restic is unavailable or its output is
/// not a JSON array.
pub async fn snapshot_count<R: CommandRunner + ?Sized>(runner: &R, cfg: &SyncConfig) -> usize {
    let result = runner.run(snapshots_command(cfg)).await;
    if !result.success() {
        debug!(exit_code = result.exit_code, "restic snapshots failed");
        return 0;
    }
    match serde_json::from_str::<serde_json::Value>(&result.stdout) {
        Ok(serde_json::Value::Array(items)) => items.len(),
        Ok(_) => 0,
        Err(err) => {
            debug!(error = %err, "could not parse restic snapshots output");
            0
        }
    }
}

/// Describe the local replica. The directory walk runs on the blocking
/// pool; the replica holds thousands of pack files.
pub async fn repository_info<R: CommandRunner + ?Sized>(
    fs: Arc<dyn FileSystem>,
    runner: &R,
    cfg: &SyncConfig,
) -> RepositoryInfo {
    let repo = cfg.local.repo_path.clone();
    if !fs.exists(&repo) {
        return RepositoryInfo {
            status: RepositoryStatus::Missing,
            size: 0,
            snapshots: 0,
            error: None,
        };
    }

    let walked = tokio::task::spawn_blocking(move || directory_size(fs.as_ref(), &repo))
        .await
        .map_err(|e| anyhow!("blocking task failed: {e}"))
        .and_then(|size| size);

    match walked {
        Ok(size) => RepositoryInfo {
            status: RepositoryStatus::Available,
            size,
            snapshots: snapshot_count(runner, cfg).await,
            error: None,
        },
        Err(err) => RepositoryInfo {
            status: RepositoryStatus::Error,
            size: 0,
            snapshots: 0,
            error: Some(format!("{err:#}")),
        },
    }
}
