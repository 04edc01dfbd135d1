use serde::{Deserialize, Serialize};

use super::{FunctionCall, Part};

/// Why generation stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    /// Natural end, stop sequence, or handing over to tools
    Stop,
    /// Output token limit reached
    MaxTokens,
    /// Blocked by the backend's safety filter
    Safety,
    /// Backend gave no usable reason
    #[default]
    Unspecified,
}

/// Token accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
    /// Total as reported, or the sum when not reported
    pub total_tokens: u32,
}

impl Usage {
    /// Usage from input and output counts
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }
}

/// A single streamed increment
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    /// Reply text fragment
    Text(String),
    /// Reasoning text fragment
    Thought(String),
    /// A function call whose arguments are complete
    FunctionCall(FunctionCall),
}

/// The complete response assembled after a call finishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    /// Content in emission order
    pub parts: Vec<Part>,
    /// Why generation stopped
    pub finish_reason: FinishReason,
    /// Token accounting, when reported
    pub usage: Option<Usage>,
    /// Whether the model finished its turn
    pub turn_complete: bool,
}

impl Aggregate {
    /// Reply text, reasoning excluded
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Function calls in order
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|part| match part {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        })
    }
}

/// One item of a generation stream
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateResponse {
    /// Non-terminal increment
    Partial(Delta),
    /// Terminal aggregate; always the last item of a successful stream
    Final(Aggregate),
}
