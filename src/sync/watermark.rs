// src/sync/watermark.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::WatermarkStorage;

/// Where the supervisor keeps its watermark between restarts.
///
/// In `Memory` mode `load` always yields `None` and `persist` is a no-op,
/// so the first cycle after a restart re-transfers. In `File` mode the
/// value is a single decimal integer.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    storage: WatermarkStorage,
    path: Option<PathBuf>,
    fs: Arc<dyn FileSystem>,
}

impl WatermarkStore {
    pub fn memory() -> Self {
        Self {
            storage: WatermarkStorage::Memory,
            path: None,
            fs: Arc::new(RealFileSystem),
        }
    }

    pub fn file(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            storage: WatermarkStorage::File,
            path: Some(path.into()),
            fs,
        }
    }

    pub fn from_config(cfg: &SyncConfig, fs: Arc<dyn FileSystem>) -> Self {
        match (cfg.sync.watermark, &cfg.sync.watermark_file) {
            (WatermarkStorage::File, Some(path)) => Self::file(path.clone(), fs),
            _ => Self::memory(),
        }
    }

    pub fn storage(&self) -> WatermarkStorage {
        self.storage
    }

    /// Read the persisted watermark. Missing or corrupt files yield `None`.
    pub fn load(&self) -> Option<i64> {
        let path = self.file_path()?;
        if !self.fs.exists(path) {
            debug!(path = ?path, "no persisted watermark");
            return None;
        }
        match read_watermark(self.fs.as_ref(), path) {
            Ok(value) => {
                info!(path = ?path, watermark = value, "loaded persisted watermark");
                Some(value)
            }
            Err(err) => {
                warn!(path = ?path, error = %err, "ignoring unreadable watermark file");
                None
            }
        }
    }

    /// Persist `value`. A write failure is logged; the in-memory watermark
    /// is still authoritative for this process.
    pub fn persist(&self, value: i64) {
        let Some(path) = self.file_path() else {
            return;
        };
        match self.fs.write(path, format!("{value}\n").as_bytes()) {
            Ok(()) => debug!(path = ?path, watermark = value, "persisted watermark"),
            Err(err) => warn!(path = ?path, error = %err, "failed to persist watermark"),
        }
    }

    fn file_path(&self) -> Option<&Path> {
        match self.storage {
            WatermarkStorage::Memory => None,
            WatermarkStorage::File => self.path.as_deref(),
        }
    }
}

fn read_watermark(fs: &dyn FileSystem, path: &Path) -> Result<i64> {
    let contents = fs.read_to_string(path)?;
    contents
        .trim()
        .parse::<i64>()
        .with_context(|| format!("parsing watermark {:?}", contents.trim()))
}
