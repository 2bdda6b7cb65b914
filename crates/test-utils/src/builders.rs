#![allow(dead_code)]

use std::path::PathBuf;

use pullsync::config::{RawSyncConfig, SyncConfig};
use pullsync::types::WatermarkStorage;

/// Remote backup directory used by [`SyncConfigBuilder`].
pub const TEST_BACKUP_PATH: &str = "/backup";

/// Builder for `SyncConfig` to simplify test setup.
///
/// Starts from defaults with a test host, `/backup` as remote directory and
/// a 1-second poll interval.
pub struct SyncConfigBuilder {
    config: RawSyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawSyncConfig::default();
        config.remote.host = "backup.test".to_string();
        config.remote.backup_path = TEST_BACKUP_PATH.to_string();
        config.local.repo_path = PathBuf::from("/srv/replica");
        config.sync.interval_secs = 1;
        Self { config }
    }

    pub fn max_consecutive_failures(mut self, n: u32) -> Self {
        self.config.sync.max_consecutive_failures = n;
        self
    }

    pub fn interval_secs(mut self, secs: u64) -> Self {
        self.config.sync.interval_secs = secs;
        self
    }

    pub fn bandwidth_limit(mut self, limit: &str) -> Self {
        self.config.sync.bandwidth_limit = limit.to_string();
        self
    }

    pub fn cleanup_hook(mut self, hook: Option<&str>) -> Self {
        self.config.sync.cleanup_hook = hook.map(str::to_string);
        self
    }

    pub fn watermark_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sync.watermark = WatermarkStorage::File;
        self.config.sync.watermark_file = Some(path.into());
        self
    }

    pub fn repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.local.repo_path = path.into();
        self
    }

    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.local.log_file = Some(path.into());
        self
    }

    pub fn build(self) -> SyncConfig {
        SyncConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
