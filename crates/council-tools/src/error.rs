use thiserror::Error;

/// Tool layer errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool with this name is available to the caller
    #[error("tool not found: {name}")]
    NotFound { name: String },

    /// Arguments did not match the tool's schema
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    /// Connection or protocol failure talking to an MCP server
    #[error("transport error: {0}")]
    Transport(String),

    /// The tool ran and reported failure
    #[error("tool execution failed: {0}")]
    Execution(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
