use serde::Deserialize;

/// Long-term memory limits
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MemoryConfig {
    /// Whether memory is read and written at all
    pub enabled: bool,
    /// Binding used for summarization; the default binding when unset
    pub provider: Option<String>,
    /// Rounds kept verbatim after compression
    pub max_recent_rounds: usize,
    /// Cap on stored key facts
    pub max_key_facts: usize,
    /// Cap on the rolling summary, in characters
    pub max_summary_length: usize,
    /// Uncompressed round count that triggers compression once exceeded
    pub compress_threshold: usize,
    /// Number of key facts returned per query
    pub relevant_facts: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: None,
            max_recent_rounds: 3,
            max_key_facts: 20,
            max_summary_length: 2000,
            compress_threshold: 5,
            relevant_facts: 5,
        }
    }
}
