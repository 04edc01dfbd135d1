//! Conversion between unified types and `OpenAI` Chat Completions wire format

use std::sync::Arc;

use crate::aggregate::{BlockAggregator, assemble_reply, parse_args};
use crate::error::LlmError;
use crate::protocol::openai::{
    OpenAiFunction, OpenAiFunctionCall, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk,
    OpenAiStreamError, OpenAiStreamOptions, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::sse::{StreamDecoder, parse_event};
use crate::think::{SplitText, split_think};
use crate::types::{Aggregate, Delta, FinishReason, FunctionCall, GenerateRequest, GenerateResponse, Part, Role, Usage};
use crate::vendor::VendorToolCallParser;

// -- Outbound: unified request -> OpenAI wire format --

/// Build a Chat Completions request for `model`
pub fn to_openai_request(request: &GenerateRequest, model: &str, stream: bool) -> OpenAiRequest {
    let mut messages = Vec::new();

    if let Some(system) = request.system_text() {
        messages.push(text_message("system", system.to_owned()));
    }

    for turn in request.normalized_turns() {
        match turn.role {
            Role::User => push_user_turn(&mut messages, turn.parts),
            Role::Model => push_model_turn(&mut messages, turn.parts),
        }
    }

    OpenAiRequest {
        model: model.to_owned(),
        messages,
        temperature: request.params.temperature,
        top_p: request.params.top_p,
        max_tokens: request.params.max_output_tokens,
        stop: request.params.stop_sequences.clone(),
        stream: stream.then_some(true),
        tools: request
            .tools
            .iter()
            .map(|tool| OpenAiTool {
                tool_type: "function".to_owned(),
                function: OpenAiFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect(),
        stream_options: stream.then_some(OpenAiStreamOptions { include_usage: true }),
    }
}

fn text_message(role: &str, text: String) -> OpenAiMessage {
    OpenAiMessage {
        role: role.to_owned(),
        content: Some(text),
        tool_calls: Vec::new(),
        tool_call_id: None,
    }
}

/// Tool results become `tool` messages; remaining text one `user` message after them
fn push_user_turn(messages: &mut Vec<OpenAiMessage>, parts: Vec<Part>) {
    let mut text = String::new();

    for part in parts {
        match part {
            Part::Text { text: t } => text.push_str(&t),
            Part::FunctionResponse(response) => messages.push(OpenAiMessage {
                role: "tool".to_owned(),
                content: Some(response.response_text()),
                tool_calls: Vec::new(),
                tool_call_id: Some(response.id),
            }),
            Part::Thought { .. } | Part::FunctionCall(_) => {}
        }
    }

    if !text.is_empty() {
        messages.push(text_message("user", text));
    }
}

fn push_model_turn(messages: &mut Vec<OpenAiMessage>, parts: Vec<Part>) {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        match part {
            Part::Text { text: t } => text.push_str(&t),
            Part::FunctionCall(call) => tool_calls.push(OpenAiToolCall {
                id: call.id,
                tool_type: "function".to_owned(),
                function: OpenAiFunctionCall {
                    name: call.name,
                    arguments: call.args.to_string(),
                },
            }),
            Part::Thought { .. } | Part::FunctionResponse(_) => {}
        }
    }

    if text.is_empty() && tool_calls.is_empty() {
        return;
    }

    messages.push(OpenAiMessage {
        role: "assistant".to_owned(),
        content: (!text.is_empty()).then_some(text),
        tool_calls,
        tool_call_id: None,
    });
}

// -- Inbound: OpenAI wire format -> unified response --

/// Map an `OpenAI` finish reason
pub fn finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("stop" | "tool_calls" | "function_call") => FinishReason::Stop,
        Some("length") => FinishReason::MaxTokens,
        Some("content_filter") => FinishReason::Safety,
        _ => FinishReason::Unspecified,
    }
}

fn usage(u: OpenAiUsage) -> Usage {
    Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        total_tokens: if u.total_tokens > 0 {
            u.total_tokens
        } else {
            u.prompt_tokens.saturating_add(u.completion_tokens)
        },
    }
}

/// Convert a complete response
pub fn aggregate_from_response(response: OpenAiResponse, vendor: &dyn VendorToolCallParser) -> Aggregate {
    let usage = response.usage.map(usage);
    let Some(choice) = response.choices.into_iter().next() else {
        return Aggregate {
            usage,
            turn_complete: true,
            ..Default::default()
        };
    };

    let (inline_thought, text) = split_think(choice.message.content.as_deref().unwrap_or_default());
    let thought = choice.message.reasoning_content.unwrap_or_default() + &inline_thought;

    let native_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            Part::FunctionCall(FunctionCall {
                args: parse_args(&call.function.name, &call.function.arguments),
                id: call.id,
                name: call.function.name,
            })
        })
        .collect();

    Aggregate {
        parts: assemble_reply(&thought, &text, native_calls, vendor),
        finish_reason: finish_reason(choice.finish_reason.as_deref()),
        usage,
        turn_complete: true,
    }
}

// -- Streaming --

/// Tracks Chat Completions stream state across chunks
pub struct OpenAiDecoder {
    text: SplitText,
    calls: BlockAggregator,
    finish_reason: Option<String>,
    usage: Option<OpenAiUsage>,
    vendor: Arc<dyn VendorToolCallParser>,
}

impl OpenAiDecoder {
    /// Decoder that runs `vendor` over the final text
    pub fn new(vendor: Arc<dyn VendorToolCallParser>) -> Self {
        Self {
            text: SplitText::new(),
            calls: BlockAggregator::new(),
            finish_reason: None,
            usage: None,
            vendor,
        }
    }

    /// Apply one decoded chunk
    pub fn apply(&mut self, chunk: OpenAiStreamChunk) -> Vec<GenerateResponse> {
        let mut deltas = Vec::new();

        if let Some(u) = chunk.usage {
            self.usage = Some(u);
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Vec::new();
        };

        if let Some(reasoning) = choice.delta.reasoning_content.filter(|r| !r.is_empty()) {
            deltas.push(self.text.push_thought(&reasoning));
        }

        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            deltas.extend(self.text.feed(&content));
        }

        for call in choice.delta.tool_calls {
            let (name, arguments) = call
                .function
                .map(|f| (f.name.unwrap_or_default(), f.arguments.unwrap_or_default()))
                .unwrap_or_default();
            let id = call.id.unwrap_or_default();
            if !id.is_empty() || !name.is_empty() {
                self.calls.start_tool_call(call.index, &id, &name);
            }
            if !arguments.is_empty() {
                self.calls.push_args(call.index, &arguments);
            }
        }

        if choice.finish_reason.is_some() {
            self.finish_reason = choice.finish_reason;
        }

        deltas.into_iter().map(GenerateResponse::Partial).collect()
    }
}

impl StreamDecoder for OpenAiDecoder {
    fn on_event(&mut self, _event: &str, data: &str) -> Result<Vec<GenerateResponse>, LlmError> {
        if let Ok(failure) = serde_json::from_str::<OpenAiStreamError>(data) {
            return Err(LlmError::Protocol(format!(
                "openai stream error: {}",
                failure.error.message
            )));
        }
        let chunk = parse_event::<OpenAiStreamChunk>(data)?;
        Ok(self.apply(chunk))
    }

    fn drain(&mut self) -> Vec<GenerateResponse> {
        self.text
            .flush()
            .into_iter()
            .chain(self.calls.function_calls().into_iter().map(Delta::FunctionCall))
            .map(GenerateResponse::Partial)
            .collect()
    }

    fn finish(&mut self) -> Result<Aggregate, LlmError> {
        let native_calls = std::mem::take(&mut self.calls).finish();
        Ok(Aggregate {
            parts: assemble_reply(&self.text.thought, &self.text.text, native_calls, self.vendor.as_ref()),
            finish_reason: finish_reason(self.finish_reason.as_deref()),
            usage: self.usage.map(usage),
            turn_complete: true,
        })
    }
}
