//! Per-topic transcript files

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use council_memory::file_stem;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::message::ChatMessage;

/// Appends messages to `<dir>/<topic>.json`
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    dir: PathBuf,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Arc::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(topic)))
    }

    fn lock_for(&self, topic: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(topic.to_owned()).or_default().value())
    }

    /// Messages of a topic in append order, empty when none are stored
    pub async fn load(&self, topic: &str) -> io::Result<Vec<ChatMessage>> {
        let lock = self.lock_for(topic);
        let _guard = lock.lock().await;
        self.read(topic).await
    }

    /// Append one message
    pub async fn append(&self, topic: &str, message: &ChatMessage) -> io::Result<()> {
        let lock = self.lock_for(topic);
        let _guard = lock.lock().await;

        let mut messages = self.read(topic).await?;
        messages.push(message.clone());

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(topic);
        let staging = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&messages).map_err(io::Error::other)?;
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await
    }

    /// Drop a topic's transcript; missing transcripts are not an error
    pub async fn clear(&self, topic: &str) -> io::Result<()> {
        let lock = self.lock_for(topic);
        let _guard = lock.lock().await;
        match tokio::fs::remove_file(self.path_for(topic)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    async fn read(&self, topic: &str) -> io::Result<Vec<ChatMessage>> {
        match tokio::fs::read(self.path_for(topic)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
