//! `OpenAI` Responses API wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Responses API request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    /// Model identifier
    pub model: String,
    /// Input items
    pub input: Vec<ResponsesInputItem>,
    /// System instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Output token limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Tool definitions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ResponsesTool>,
    /// Whether to stream
    pub stream: bool,
}

/// Input item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesInputItem {
    /// Role message with text content
    Message {
        /// "user" or "assistant"
        role: String,
        /// Text content
        content: String,
    },
    /// Typed item (function calls and their outputs)
    Typed(ResponsesTypedItem),
}

/// Typed input item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesTypedItem {
    /// A call the model made earlier
    FunctionCall {
        /// Call id
        call_id: String,
        /// Function name
        name: String,
        /// JSON-encoded arguments
        arguments: String,
    },
    /// Result of a call
    FunctionCallOutput {
        /// Call id
        call_id: String,
        /// Result text
        output: String,
    },
}

/// Function tool definition (flat, unlike Chat Completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesTool {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

// -- Response types --

/// Non-streaming response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesResponse {
    /// Output items
    #[serde(default)]
    pub output: Vec<ResponsesOutputItem>,
    /// Convenience concatenation of output text, when the backend supplies it
    #[serde(default)]
    pub output_text: Option<String>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<ResponsesUsage>,
}

/// Output item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputItem {
    /// Assistant message
    Message {
        /// Content pieces
        #[serde(default)]
        content: Vec<ResponsesOutputContent>,
    },
    /// Function call
    FunctionCall {
        /// Item id
        #[serde(default)]
        id: String,
        /// Call id
        #[serde(default)]
        call_id: String,
        /// Function name
        #[serde(default)]
        name: String,
        /// JSON-encoded arguments
        #[serde(default)]
        arguments: String,
    },
    /// Reasoning and other items
    #[serde(other)]
    Other,
}

/// Content piece of an output message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutputContent {
    /// Generated text
    OutputText {
        /// The text
        text: String,
    },
    /// Refusals and other content
    #[serde(other)]
    Other,
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResponsesUsage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u32,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u32,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
}

// -- Streaming types --

/// `response.output_text.delta`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesTextDelta {
    /// Text fragment
    pub delta: String,
}

/// `response.function_call_arguments.delta`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesArgumentsDelta {
    /// Item the fragment belongs to
    pub item_id: String,
    /// Arguments fragment
    pub delta: String,
}

/// `response.output_item.added` and `response.output_item.done`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesItemEvent {
    /// The item
    pub item: ResponsesStreamItem,
}

/// Output item as it appears in stream events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesStreamItem {
    /// Item kind
    #[serde(rename = "type")]
    pub item_type: String,
    /// Item id
    #[serde(default)]
    pub id: String,
    /// Call id, for function calls
    #[serde(default)]
    pub call_id: String,
    /// Function name, for function calls
    #[serde(default)]
    pub name: String,
    /// Complete arguments, on `done`
    #[serde(default)]
    pub arguments: String,
}

/// `response.completed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesCompleted {
    /// Final response object
    pub response: ResponsesResponse,
}

/// `error` and `response.failed`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesStreamError {
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
    /// Failed response, carrying the error for `response.failed`
    #[serde(default)]
    pub response: Option<ResponsesFailedResponse>,
}

/// Response object of a `response.failed` event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesFailedResponse {
    /// Error details
    #[serde(default)]
    pub error: Option<ResponsesErrorDetail>,
}

/// Error details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesErrorDetail {
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}
