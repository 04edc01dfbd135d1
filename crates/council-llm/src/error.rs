use thiserror::Error;

/// Errors that can occur while talking to a model backend
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network failure reaching the backend
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as much as could be read
        body: String,
    },

    /// Malformed or unexpected data in a response or event stream
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The backend cannot do what the request asks
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Request could not be built from the unified form
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Cooperative cancellation was observed mid-call
    #[error("cancelled")]
    Cancelled,

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Whether a second attempt at the same call may succeed
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Protocol(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Unsupported(_) | Self::InvalidRequest(_) | Self::Cancelled | Self::Internal(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Protocol(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        let status = |status| LlmError::Status {
            status,
            body: String::new(),
        };

        assert!(status(500).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(LlmError::Transport("reset".into()).is_retryable());
        assert!(!LlmError::Cancelled.is_retryable());
    }
}
