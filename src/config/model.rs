// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::WatermarkStorage;

/// Name of the advisory marker file inside the remote backup directory.
pub const MARKER_FILE_NAME: &str = "sync-in-progress";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [remote]
/// host = "backup.example.org"
/// user = "admin"
/// backup_path = "/opt/docker-swarm/backup"
///
/// [local]
/// repo_path = "/app/repository"
///
/// [sync]
/// interval_secs = 900
/// bandwidth_limit = "10M"
/// max_consecutive_failures = 3
/// ```
///
/// Every section is optional. Only `remote.host` has no usable default, and
/// it may also come from `REMOTE_HOST`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSyncConfig {
    #[serde(default)]
    pub remote: RemoteSection,

    #[serde(default)]
    pub local: LocalSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub timeouts: TimeoutSection,

    #[serde(default)]
    pub health: HealthSection,
}

/// Validated, immutable configuration.
///
/// Only obtainable through `SyncConfig::try_from(RawSyncConfig)`, so every
/// holder can rely on the invariants checked in `validate.rs`.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub remote: RemoteSection,
    pub local: LocalSection,
    pub sync: SyncSection,
    pub timeouts: TimeoutSection,
    pub health: HealthSection,
}

/// `[remote]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
    /// SSH host of the machine running the backups.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_remote_user")]
    pub user: String,

    /// Directory holding `repository/`, `scripts/` and the marker file.
    #[serde(default = "default_backup_path")]
    pub backup_path: String,
}

fn default_remote_user() -> String {
    "admin".to_string()
}

fn default_backup_path() -> String {
    "/opt/docker-swarm/backup".to_string()
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: default_remote_user(),
            backup_path: default_backup_path(),
        }
    }
}

/// `[local]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSection {
    /// Local replica of the remote repository.
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,

    /// Password file handed to restic via `RESTIC_PASSWORD_FILE`.
    #[serde(default = "default_password_file")]
    pub password_file: PathBuf,

    /// Optional log file. The health endpoint uses its mtime as the
    /// "still alive" signal.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_repo_path() -> PathBuf {
    PathBuf::from("/app/repository")
}

fn default_password_file() -> PathBuf {
    PathBuf::from("/app/config/restic-password")
}

impl Default for LocalSection {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            password_file: default_password_file(),
            log_file: None,
        }
    }
}

/// `[sync]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSection {
    /// Seconds between the start of one wait and the next cycle.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Passed verbatim to `rsync --bwlimit`.
    #[serde(default = "default_bandwidth_limit")]
    pub bandwidth_limit: String,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Passed to `restic check --read-data-subset`.
    #[serde(default = "default_verify_subset")]
    pub verify_subset: String,

    /// Remote maintenance hook, relative to `remote.backup_path` unless
    /// absolute. Empty disables it.
    #[serde(default = "default_cleanup_hook")]
    pub cleanup_hook: Option<String>,

    #[serde(default)]
    pub watermark: WatermarkStorage,

    /// Required when `watermark = "file"`.
    #[serde(default)]
    pub watermark_file: Option<PathBuf>,
}

fn default_interval_secs() -> u64 {
    900
}

fn default_bandwidth_limit() -> String {
    "10M".to_string()
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_verify_subset() -> String {
    "1%".to_string()
}

fn default_cleanup_hook() -> Option<String> {
    Some("scripts/cleanup-remote.sh".to_string())
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            bandwidth_limit: default_bandwidth_limit(),
            max_consecutive_failures: default_max_consecutive_failures(),
            verify_subset: default_verify_subset(),
            cleanup_hook: default_cleanup_hook(),
            watermark: WatermarkStorage::default(),
            watermark_file: None,
        }
    }
}

/// `[timeouts]` section. All values in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutSection {
    /// Marker, stat, echo and touch one-liners.
    #[serde(default = "default_remote_command_secs")]
    pub remote_command_secs: u64,

    /// SSH `ConnectTimeout`.
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,

    #[serde(default = "default_transfer_secs")]
    pub transfer_secs: u64,

    #[serde(default = "default_verify_secs")]
    pub verify_secs: u64,

    #[serde(default = "default_cleanup_secs")]
    pub cleanup_secs: u64,
}

fn default_remote_command_secs() -> u64 {
    30
}

fn default_connect_secs() -> u64 {
    10
}

fn default_transfer_secs() -> u64 {
    3600
}

fn default_verify_secs() -> u64 {
    600
}

fn default_cleanup_secs() -> u64 {
    1800
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            remote_command_secs: default_remote_command_secs(),
            connect_secs: default_connect_secs(),
            transfer_secs: default_transfer_secs(),
            verify_secs: default_verify_secs(),
            cleanup_secs: default_cleanup_secs(),
        }
    }
}

/// `[health]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthSection {
    /// Port for the HTTP health endpoints. `None` disables the server.
    #[serde(default)]
    pub port: Option<u16>,

    /// The service counts as unhealthy once the log file is older than this.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_stale_after_secs() -> u64 {
    1800
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            port: None,
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl SyncConfig {
    /// Construct without validation. Use `SyncConfig::try_from` instead.
    pub(crate) fn new_unchecked(raw: RawSyncConfig) -> Self {
        Self {
            remote: raw.remote,
            local: raw.local,
            sync: raw.sync,
            timeouts: raw.timeouts,
            health: raw.health,
        }
    }

    /// `user@host`, the SSH destination.
    pub fn remote_target(&self) -> String {
        format!("{}@{}", self.remote.user, self.remote.host)
    }

    fn backup_root(&self) -> &str {
        let trimmed = self.remote.backup_path.trim_end_matches('/');
        if trimmed.is_empty() { "/" } else { trimmed }
    }

    fn remote_join(&self, rel: &str) -> String {
        let root = self.backup_root();
        if root == "/" {
            format!("/{rel}")
        } else {
            format!("{root}/{rel}")
        }
    }

    pub fn marker_path(&self) -> String {
        self.remote_join(MARKER_FILE_NAME)
    }

    /// File whose mtime/size stands in for "the repository changed".
    pub fn identity_file(&self) -> String {
        self.remote_join("repository/config")
    }

    /// rsync source spec; the trailing slash copies directory contents.
    pub fn transfer_source(&self) -> String {
        format!(
            "{}:{}/",
            self.remote_target(),
            self.remote_join("repository")
        )
    }

    pub fn transfer_destination(&self) -> String {
        let local = self.local.repo_path.to_string_lossy();
        format!("{}/", local.trim_end_matches('/'))
    }

    pub fn cleanup_hook_path(&self) -> Option<String> {
        let hook = self.sync.cleanup_hook.as_deref()?;
        if hook.starts_with('/') {
            Some(hook.to_string())
        } else {
            Some(self.remote_join(hook))
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn remote_command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.remote_command_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.transfer_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.verify_secs)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.cleanup_secs)
    }
}
