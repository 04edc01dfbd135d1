//! Retrieval, append and compression per topic

use std::sync::Arc;

use council_config::MemoryConfig;
use dashmap::DashMap;
use jiff::Timestamp;
use tokio::sync::Mutex;

use crate::error::MemoryError;
use crate::model::{KeyFact, MemoryContext, RoundRecord, TopicMemory};
use crate::relevance::rank_facts;
use crate::store::MemoryStore;
use crate::summarizer::{FactDraft, Summarizer};

/// Per-topic memory with serialized writers
pub struct MemoryManager {
    config: MemoryConfig,
    store: MemoryStore,
    summarizer: Option<Arc<dyn Summarizer>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MemoryManager {
    /// Without a summarizer rounds stay verbatim and compression is skipped.
    pub fn new(config: MemoryConfig, store: MemoryStore, summarizer: Option<Arc<dyn Summarizer>>) -> Self {
        Self {
            config,
            store,
            summarizer,
            locks: DashMap::new(),
        }
    }

    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn lock_for(&self, topic: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(topic.to_owned()).or_default().value())
    }

    /// Memory excerpt for an incoming query
    ///
    /// The recent window is always included; facts are ranked by relevance.
    pub async fn relevant_context(&self, topic: &str, query: &str) -> Result<MemoryContext, MemoryError> {
        if !self.config.enabled {
            return Ok(MemoryContext::default());
        }

        let lock = self.lock_for(topic);
        let _guard = lock.lock().await;
        let Some(memory) = self.store.load(topic).await? else {
            return Ok(MemoryContext::default());
        };

        let window_start = memory.rounds.len().saturating_sub(self.config.max_recent_rounds);
        let recent_rounds = memory.rounds[window_start..].to_vec();
        let key_facts = rank_facts(&memory.key_facts, &recent_rounds, query, self.config.relevant_facts);

        Ok(MemoryContext {
            key_facts,
            recent_rounds,
            summary: memory.summary,
        })
    }

    /// Record a completed round
    ///
    /// Key facts are extracted from the round, then older rounds are
    /// compressed once enough of them piled up. A failed extraction still
    /// stores the round.
    pub async fn append_round(&self, topic: &str, round: RoundRecord) -> Result<(), MemoryError> {
        if !self.config.enabled {
            return Ok(());
        }

        let lock = self.lock_for(topic);
        let _guard = lock.lock().await;
        let mut memory = self.store.load(topic).await?.unwrap_or_else(|| TopicMemory::new(topic));

        if let Some(summarizer) = &self.summarizer {
            match summarizer.extract_facts(topic, &round).await {
                Ok(drafts) => self.add_facts(&mut memory, drafts),
                Err(e) => tracing::warn!(topic, round = round.round, error = %e, "fact extraction failed"),
            }
        }

        memory.rounds.push(round);
        memory.updated_at = Timestamp::now();

        if memory.rounds.len() > self.config.compress_threshold {
            self.compress_locked(&mut memory).await;
        }

        self.store.save(&memory).await?;
        tracing::debug!(topic, rounds = memory.rounds.len(), facts = memory.key_facts.len(), "memory round appended");
        Ok(())
    }

    /// Condense every round older than the recent window
    ///
    /// Returns whether anything changed. A topic with nothing beyond the
    /// window is left untouched.
    pub async fn compress(&self, topic: &str) -> Result<bool, MemoryError> {
        let lock = self.lock_for(topic);
        let _guard = lock.lock().await;
        let Some(mut memory) = self.store.load(topic).await? else {
            return Ok(false);
        };

        let changed = self.compress_locked(&mut memory).await;
        if changed {
            self.store.save(&memory).await?;
        }
        Ok(changed)
    }

    /// Forget a topic entirely
    ///
    /// The topic's lock stays registered so writers already queued on it
    /// remain serialized with later ones.
    pub async fn delete(&self, topic: &str) -> Result<(), MemoryError> {
        let lock = self.lock_for(topic);
        let _guard = lock.lock().await;
        self.store.delete(topic).await?;
        tracing::info!(topic, "memory deleted");
        Ok(())
    }

    async fn compress_locked(&self, memory: &mut TopicMemory) -> bool {
        let Some(summarizer) = &self.summarizer else {
            return false;
        };
        let overflow = memory.rounds.len().saturating_sub(self.config.max_recent_rounds);
        if overflow == 0 {
            return false;
        }

        let condensed = match summarizer
            .condense(&memory.topic, &memory.summary, &memory.rounds[..overflow])
            .await
        {
            Ok(condensed) => condensed,
            Err(e) => {
                tracing::warn!(topic = %memory.topic, error = %e, "memory compression failed, keeping rounds verbatim");
                return false;
            }
        };

        if !condensed.summary.is_empty() {
            if !memory.summary.is_empty() {
                memory.summary.push('\n');
            }
            memory.summary.push_str(&condensed.summary);
        }
        memory.summary = keep_tail_chars(&memory.summary, self.config.max_summary_length);

        self.add_facts(memory, condensed.facts);

        memory.rounds.drain(..overflow);
        memory.compressed_rounds += overflow as u64;
        memory.updated_at = Timestamp::now();

        tracing::info!(
            topic = %memory.topic,
            condensed = overflow,
            facts = memory.key_facts.len(),
            "memory compressed"
        );
        true
    }

    /// Append new facts, skipping repeats, then evict the oldest beyond the cap
    fn add_facts(&self, memory: &mut TopicMemory, drafts: Vec<FactDraft>) {
        let now = Timestamp::now();
        for draft in drafts {
            if memory.key_facts.iter().any(|fact| fact.text == draft.text) {
                continue;
            }
            memory.key_facts.push(KeyFact {
                text: draft.text,
                kind: draft.kind,
                timestamp: now,
            });
        }
        let excess = memory.key_facts.len().saturating_sub(self.config.max_key_facts);
        memory.key_facts.drain(..excess);
    }
}

/// Last `max` characters of `text`
fn keep_tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_owned();
    }
    text.chars().skip(count - max).collect()
}
