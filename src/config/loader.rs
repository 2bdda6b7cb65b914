// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::config::model::{RawSyncConfig, SyncConfig};
use crate::errors::{PullsyncError, Result};
use crate::types::WatermarkStorage;

/// Load a configuration file from a given path and return the raw
/// `RawSyncConfig`.
///
/// This only performs TOML deserialization; env overrides and validation
/// happen in [`load`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSyncConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawSyncConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load, override and validate.
///
/// - `path = Some(p)`: `p` must exist.
/// - `path = None`: [`default_config_path`] is used if present, otherwise
///   the built-in defaults.
///
/// `lookup` resolves environment variables; production passes
/// `std::env::var`, tests pass a map.
pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<SyncConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut raw = match path {
        Some(p) => load_from_path(p)?,
        None => {
            let default_path = default_config_path();
            if default_path.is_file() {
                load_from_path(&default_path)?
            } else {
                debug!(path = ?default_path, "no config file; using defaults");
                RawSyncConfig::default()
            }
        }
    };

    apply_env_overrides(&mut raw, lookup)?;
    SyncConfig::try_from(raw)
}

/// Recommended entry point: [`load`] against the real process environment.
pub fn load_and_validate(path: Option<&Path>) -> Result<SyncConfig> {
    load(path, |key| std::env::var(key).ok())
}

/// Layer environment variables on top of the file/default values.
///
/// Variable names match the container deployment this tool replaces, so an
/// existing `docker-compose.yml` keeps working unchanged.
pub fn apply_env_overrides<F>(raw: &mut RawSyncConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("REMOTE_HOST") {
        raw.remote.host = v;
    }
    if let Some(v) = lookup("REMOTE_USER") {
        raw.remote.user = v;
    }
    if let Some(v) = lookup("REMOTE_BACKUP_PATH") {
        raw.remote.backup_path = v;
    }
    if let Some(v) = lookup("LOCAL_REPO_PATH") {
        raw.local.repo_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("RESTIC_PASSWORD_FILE") {
        raw.local.password_file = PathBuf::from(v);
    }
    if let Some(v) = lookup("SYNC_LOG_FILE") {
        raw.local.log_file = non_empty(v).map(PathBuf::from);
    }
    if let Some(v) = lookup("SYNC_INTERVAL") {
        raw.sync.interval_secs = parse_env("SYNC_INTERVAL", &v)?;
    }
    if let Some(v) = lookup("BANDWIDTH_LIMIT") {
        raw.sync.bandwidth_limit = v;
    }
    if let Some(v) = lookup("MAX_RETRIES") {
        raw.sync.max_consecutive_failures = parse_env("MAX_RETRIES", &v)?;
    }
    if let Some(v) = lookup("CLEANUP_HOOK") {
        raw.sync.cleanup_hook = non_empty(v);
    }
    if let Some(v) = lookup("WATERMARK_STORAGE") {
        raw.sync.watermark =
            WatermarkStorage::from_str(&v).map_err(PullsyncError::ConfigError)?;
    }
    if let Some(v) = lookup("WATERMARK_FILE") {
        raw.sync.watermark_file = non_empty(v).map(PathBuf::from);
    }
    if let Some(v) = lookup("HEALTH_CHECK_PORT") {
        raw.health.port = match non_empty(v) {
            Some(port) => Some(parse_env("HEALTH_CHECK_PORT", &port)?),
            None => None,
        };
    }
    Ok(())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        PullsyncError::ConfigError(format!("environment variable {key} has invalid value '{value}'"))
    })
}

fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() { None } else { Some(v) }
}

/// Config file consulted when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Pullsync.toml")
}
