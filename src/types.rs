use std::str::FromStr;
use serde::Deserialize;

/// Where the sync watermark lives between cycles.
///
/// - `Memory` (default): the watermark is forgotten on restart, so the first
///   cycle after a restart always transfers. The copy is incremental, so this
///   is cheap but not free.
/// - `File`: the watermark is written to disk after every verified sync and
///   read back at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkStorage {
    Memory,
    File,
}

impl Default for WatermarkStorage {
    fn default() -> Self {
        WatermarkStorage::Memory
    }
}

impl FromStr for WatermarkStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(WatermarkStorage::Memory),
            "file" => Ok(WatermarkStorage::File),
            other => Err(format!(
                "invalid watermark storage: {other} (expected \"memory\" or \"file\")"
            )),
        }
    }
}
