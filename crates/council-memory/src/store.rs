//! One JSON file per topic

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::MemoryError;
use crate::model::TopicMemory;

/// File-backed topic memory store
#[derive(Debug, Clone)]
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a topic's file
    ///
    /// Characters outside `[A-Za-z0-9.-]` are escaped as `_{hex}_`, so
    /// distinct topics map to distinct files inside the store directory.
    pub fn path_for(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(topic)))
    }

    /// Load a topic, `None` when nothing is stored yet
    pub async fn load(&self, topic: &str) -> Result<Option<TopicMemory>, MemoryError> {
        match tokio::fs::read(self.path_for(topic)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a topic, replacing the previous file atomically
    pub async fn save(&self, memory: &TopicMemory) -> Result<(), MemoryError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&memory.topic);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, serde_json::to_vec_pretty(memory)?).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }

    /// Remove a topic; missing topics are not an error
    pub async fn delete(&self, topic: &str) -> Result<(), MemoryError> {
        match tokio::fs::remove_file(self.path_for(topic)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// File name stem for a topic id
pub fn file_stem(topic: &str) -> String {
    let mut stem = String::with_capacity(topic.len());
    for c in topic.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
            stem.push(c);
        } else {
            let _ = write!(stem, "_{:x}_", u32::from(c));
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("memory"));

        assert!(store.load("sh600519").await.unwrap().is_none());

        let mut memory = TopicMemory::new("sh600519");
        memory.summary = "白酒龙头，估值偏高".into();
        store.save(&memory).await.unwrap();
        assert_eq!(store.load("sh600519").await.unwrap(), Some(memory));

        store.delete("sh600519").await.unwrap();
        store.delete("sh600519").await.unwrap();
        assert!(store.load("sh600519").await.unwrap().is_none());
    }

    #[test]
    fn topic_ids_stay_inside_the_store() {
        let store = MemoryStore::new("/data/memory");

        assert_eq!(store.path_for("sh600519"), Path::new("/data/memory/sh600519.json"));
        assert_eq!(store.path_for("../etc"), Path::new("/data/memory/.._2f_etc.json"));
        assert_eq!(store.path_for("茅台"), Path::new("/data/memory/_8305__53f0_.json"));
        assert_ne!(store.path_for("a_b"), store.path_for("a/b"));
    }
}
