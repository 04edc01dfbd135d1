use council_llm::LlmError;
use council_memory::MemoryError;
use council_tools::ToolError;
use thiserror::Error;

/// Meeting orchestration errors
#[derive(Debug, Error)]
pub enum MeetingError {
    /// No model binding resolves for a participant
    #[error("no model binding configured for {0}")]
    ConfigurationMissing(String),

    /// The meeting was superseded or cancelled
    #[error("meeting cancelled")]
    Cancelled,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Transcript storage failed
    #[error("transcript storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl MeetingError {
    /// Whether another attempt could plausibly succeed
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Tool(ToolError::Transport(_)) => true,
            _ => false,
        }
    }
}
