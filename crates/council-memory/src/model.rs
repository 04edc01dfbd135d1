use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// What a key fact records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FactKind {
    #[default]
    Fact,
    Opinion,
    Decision,
}

/// A short extracted fact, opinion or decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFact {
    pub text: String,
    pub kind: FactKind,
    pub timestamp: Timestamp,
}

/// One agent's reply within a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEntry {
    pub agent_id: String,
    pub agent_name: String,
    pub role: String,
    pub content: String,
}

/// A completed discussion round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Round number within its meeting
    pub round: u32,
    /// The user query that opened the meeting
    pub query: String,
    pub entries: Vec<RoundEntry>,
    pub timestamp: Timestamp,
}

impl RoundRecord {
    /// Flattened text used for relevance scoring and summarization
    pub fn text(&self) -> String {
        let mut text = self.query.clone();
        for entry in &self.entries {
            text.push('\n');
            text.push_str(&entry.agent_name);
            text.push_str(": ");
            text.push_str(&entry.content);
        }
        text
    }
}

/// Everything remembered about one topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMemory {
    pub topic: String,
    #[serde(default)]
    pub key_facts: Vec<KeyFact>,
    /// Rounds not yet condensed, oldest first
    #[serde(default)]
    pub rounds: Vec<RoundRecord>,
    #[serde(default)]
    pub summary: String,
    /// Total rounds folded into the summary so far
    #[serde(default)]
    pub compressed_rounds: u64,
    pub updated_at: Timestamp,
}

impl TopicMemory {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key_facts: Vec::new(),
            rounds: Vec::new(),
            summary: String::new(),
            compressed_rounds: 0,
            updated_at: Timestamp::now(),
        }
    }
}

/// Memory excerpt handed to an agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryContext {
    /// Most relevant facts, best first
    pub key_facts: Vec<KeyFact>,
    /// Verbatim recent window, oldest first
    pub recent_rounds: Vec<RoundRecord>,
    pub summary: String,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.key_facts.is_empty() && self.recent_rounds.is_empty() && self.summary.is_empty()
    }
}
