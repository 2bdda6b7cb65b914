// src/config/validate.rs

use crate::config::model::{RawSyncConfig, SyncConfig};
use crate::errors::{PullsyncError, Result};
use crate::types::WatermarkStorage;

impl TryFrom<RawSyncConfig> for SyncConfig {
    type Error = crate::errors::PullsyncError;

    fn try_from(mut raw: RawSyncConfig) -> std::result::Result<Self, Self::Error> {
        normalize(&mut raw);
        validate_raw_config(&raw)?;
        Ok(SyncConfig::new_unchecked(raw))
    }
}

fn normalize(cfg: &mut RawSyncConfig) {
    cfg.remote.host = cfg.remote.host.trim().to_string();
    cfg.remote.user = cfg.remote.user.trim().to_string();
    if cfg
        .sync
        .cleanup_hook
        .as_deref()
        .is_some_and(|h| h.trim().is_empty())
    {
        cfg.sync.cleanup_hook = None;
    }
}

fn validate_raw_config(cfg: &RawSyncConfig) -> Result<()> {
    validate_remote(cfg)?;
    validate_sync(cfg)?;
    validate_timeouts(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> PullsyncError {
    PullsyncError::ConfigError(msg.into())
}

fn validate_remote(cfg: &RawSyncConfig) -> Result<()> {
    if cfg.remote.host.is_empty() {
        return Err(config_error(
            "[remote].host is required (or set REMOTE_HOST)",
        ));
    }
    if cfg.remote.host.contains(char::is_whitespace) {
        return Err(config_error(format!(
            "[remote].host must not contain whitespace (got '{}')",
            cfg.remote.host
        )));
    }
    if cfg.remote.user.is_empty() {
        return Err(config_error("[remote].user must not be empty"));
    }
    if cfg.remote.backup_path.trim().is_empty() {
        return Err(config_error("[remote].backup_path must not be empty"));
    }
    // Ends up unquoted in the rsync `host:path` source.
    if cfg.remote.backup_path.contains(char::is_whitespace) {
        return Err(config_error(format!(
            "[remote].backup_path must not contain whitespace (got '{}')",
            cfg.remote.backup_path
        )));
    }
    Ok(())
}

fn validate_sync(cfg: &RawSyncConfig) -> Result<()> {
    let sync = &cfg.sync;

    if sync.interval_secs == 0 {
        return Err(config_error("[sync].interval_secs must be >= 1 (got 0)"));
    }
    if sync.max_consecutive_failures == 0 {
        return Err(config_error(
            "[sync].max_consecutive_failures must be >= 1 (got 0)",
        ));
    }
    if sync.bandwidth_limit.is_empty() || sync.bandwidth_limit.contains(char::is_whitespace) {
        return Err(config_error(format!(
            "[sync].bandwidth_limit must be a single rsync --bwlimit value (got '{}')",
            sync.bandwidth_limit
        )));
    }
    if sync.verify_subset.trim().is_empty() {
        return Err(config_error("[sync].verify_subset must not be empty"));
    }
    if sync.watermark == WatermarkStorage::File && sync.watermark_file.is_none() {
        return Err(config_error(
            "[sync].watermark_file is required when watermark = \"file\"",
        ));
    }
    Ok(())
}

fn validate_timeouts(cfg: &RawSyncConfig) -> Result<()> {
    let t = &cfg.timeouts;
    let checks = [
        ("remote_command_secs", t.remote_command_secs),
        ("connect_secs", t.connect_secs),
        ("transfer_secs", t.transfer_secs),
        ("verify_secs", t.verify_secs),
        ("cleanup_secs", t.cleanup_secs),
    ];
    for (name, value) in checks {
        if value == 0 {
            return Err(config_error(format!(
                "[timeouts].{name} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}
