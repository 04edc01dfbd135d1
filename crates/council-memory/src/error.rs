use thiserror::Error;

/// Memory subsystem errors
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Reading or writing a topic file failed
    #[error("memory storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A topic file could not be encoded or decoded
    #[error("memory encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The summarizer call failed or returned unusable output
    #[error("summarization failed: {0}")]
    Summarizer(String),
}
