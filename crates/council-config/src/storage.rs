use std::path::PathBuf;

use serde::Deserialize;

/// Where transcripts and memory live on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    /// Root directory; `transcripts/` and `memory/` are created beneath it
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    /// Directory holding per-topic transcripts
    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_dir.join("transcripts")
    }

    /// Directory holding per-topic memory
    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory")
    }
}
