//! Conversion between unified types and Anthropic wire format

use crate::aggregate::BlockAggregator;
use crate::error::LlmError;
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicResponseBlock,
    AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicTool, AnthropicUsage,
};
use crate::sse::{StreamDecoder, parse_event};
use crate::types::{
    Aggregate, Delta, FinishReason, FunctionCall, GenerateRequest, GenerateResponse, Part, Role, Usage,
};

/// Default max tokens when not specified (Anthropic requires this field)
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Outbound: unified request -> Anthropic wire format --

/// Build a Messages API request for `model`
pub fn to_anthropic_request(request: &GenerateRequest, model: &str) -> AnthropicRequest {
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for turn in request.normalized_turns() {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "assistant",
        };
        let blocks: Vec<AnthropicContentBlock> = turn.parts.into_iter().filter_map(part_to_block).collect();
        if blocks.is_empty() {
            continue;
        }

        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(AnthropicMessage {
                role: role.to_owned(),
                content: blocks,
            }),
        }
    }

    AnthropicRequest {
        model: model.to_owned(),
        max_tokens: request.params.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: request.system_text().map(str::to_owned),
        messages,
        temperature: request.params.temperature,
        top_p: request.params.top_p,
        stop_sequences: request.params.stop_sequences.clone(),
        stream: None,
        tools: request
            .tools
            .iter()
            .map(|tool| AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.parameters.clone(),
            })
            .collect(),
    }
}

fn part_to_block(part: Part) -> Option<AnthropicContentBlock> {
    match part {
        Part::Text { text } if !text.is_empty() => Some(AnthropicContentBlock::Text { text }),
        Part::Text { .. } | Part::Thought { .. } => None,
        Part::FunctionCall(call) => Some(AnthropicContentBlock::ToolUse {
            id: call.id,
            name: call.name,
            input: call.args,
        }),
        Part::FunctionResponse(response) => Some(AnthropicContentBlock::ToolResult {
            content: response.response_text(),
            tool_use_id: response.id,
        }),
    }
}

// -- Inbound: Anthropic wire format -> unified response --

impl From<AnthropicResponse> for Aggregate {
    fn from(response: AnthropicResponse) -> Self {
        let parts = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } if !text.is_empty() => Some(Part::Text { text }),
                AnthropicResponseBlock::Thinking { thinking } if !thinking.is_empty() => {
                    Some(Part::Thought { text: thinking })
                }
                AnthropicResponseBlock::ToolUse { id, name, input } => {
                    Some(Part::FunctionCall(FunctionCall { id, name, args: input }))
                }
                _ => None,
            })
            .collect();

        Self {
            parts,
            finish_reason: finish_reason(response.stop_reason.as_deref()),
            usage: response.usage.map(|u| Usage::new(u.input_tokens, u.output_tokens)),
            turn_complete: true,
        }
    }
}

/// Map an Anthropic stop reason
pub fn finish_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("end_turn" | "stop_sequence" | "tool_use") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::MaxTokens,
        Some("refusal") => FinishReason::Safety,
        _ => FinishReason::Unspecified,
    }
}

// -- Streaming --

/// Tracks Anthropic stream state across SSE events
#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    blocks: BlockAggregator,
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

impl AnthropicDecoder {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    fn record_usage(&mut self, update: AnthropicUsage) {
        let current = self.usage.get_or_insert_with(AnthropicUsage::default);
        if update.input_tokens > 0 {
            current.input_tokens = update.input_tokens;
        }
        current.output_tokens = update.output_tokens;
    }

    /// Apply one decoded event
    pub fn apply(&mut self, event: AnthropicStreamEvent) -> Result<Vec<GenerateResponse>, LlmError> {
        let mut out = Vec::new();

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.record_usage(usage);
                }
            }

            AnthropicStreamEvent::ContentBlockStart { index, content_block } => match content_block {
                AnthropicStreamContentBlock::Text { text } => self.blocks.start_text(index, &text),
                AnthropicStreamContentBlock::Thinking { thinking } => self.blocks.start_thought(index, &thinking),
                AnthropicStreamContentBlock::ToolUse { id, name } => self.blocks.start_tool_call(index, &id, &name),
                AnthropicStreamContentBlock::Unknown => {}
            },

            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicStreamDelta::TextDelta { text } => {
                    self.blocks.push_text(index, &text);
                    out.push(GenerateResponse::Partial(Delta::Text(text)));
                }
                AnthropicStreamDelta::ThinkingDelta { thinking } => {
                    self.blocks.push_thought(index, &thinking);
                    out.push(GenerateResponse::Partial(Delta::Thought(thinking)));
                }
                AnthropicStreamDelta::InputJsonDelta { partial_json } => self.blocks.push_args(index, &partial_json),
                AnthropicStreamDelta::Unknown => {}
            },

            AnthropicStreamEvent::ContentBlockStop { index } => {
                if let Some(call) = self.blocks.function_call(index) {
                    out.push(GenerateResponse::Partial(Delta::FunctionCall(call)));
                }
            }

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    self.record_usage(usage);
                }
            }

            AnthropicStreamEvent::Error { error } => {
                return Err(LlmError::Protocol(format!(
                    "anthropic API error: {} - {}",
                    error.error_type, error.message
                )));
            }

            AnthropicStreamEvent::MessageStop | AnthropicStreamEvent::Ping | AnthropicStreamEvent::Unknown => {}
        }

        Ok(out)
    }
}

impl StreamDecoder for AnthropicDecoder {
    fn on_event(&mut self, _event: &str, data: &str) -> Result<Vec<GenerateResponse>, LlmError> {
        let event = parse_event::<AnthropicStreamEvent>(data)?;
        self.apply(event)
    }

    fn finish(&mut self) -> Result<Aggregate, LlmError> {
        Ok(Aggregate {
            parts: std::mem::take(&mut self.blocks).finish(),
            finish_reason: finish_reason(self.stop_reason.as_deref()),
            usage: self.usage.map(|u| Usage::new(u.input_tokens, u.output_tokens)),
            turn_complete: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{FunctionResponse, ToolDeclaration, Turn};

    fn feed(decoder: &mut AnthropicDecoder, events: &[serde_json::Value]) -> Vec<GenerateResponse> {
        events
            .iter()
            .flat_map(|e| decoder.on_event("message", &e.to_string()).unwrap())
            .collect()
    }

    #[test]
    fn request_merges_roles_and_lifts_system() {
        let request = GenerateRequest {
            turns: vec![
                Turn::user_text("行情如何"),
                Turn::user_text("顺便看下成交量"),
                Turn::model(vec![
                    Part::thought("skip me"),
                    Part::FunctionCall(FunctionCall {
                        id: "toolu_1".into(),
                        name: "get_stock_realtime".into(),
                        args: json!({"codes": ["sh600519"]}),
                    }),
                ]),
                Turn {
                    role: Role::User,
                    parts: vec![Part::FunctionResponse(FunctionResponse {
                        id: "toolu_1".into(),
                        name: "get_stock_realtime".into(),
                        response: json!({"price": 1500.0}),
                    })],
                },
            ],
            system_instruction: Some("你是一位技术分析师".into()),
            tools: vec![ToolDeclaration {
                name: "get_stock_realtime".into(),
                description: "quotes".into(),
                parameters: json!({"type": "object"}),
            }],
            ..Default::default()
        };

        let wire = to_anthropic_request(&request, "claude-sonnet-4");
        let body = serde_json::to_value(&wire).unwrap();

        assert_eq!(body["system"], "你是一位技术分析师");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["messages"][0]["content"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(body["messages"][2]["content"][0]["type"], "tool_result");
        assert_eq!(body["messages"][2]["content"][0]["content"], r#"{"price":1500.0}"#);
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn interleaved_blocks_are_emitted_in_index_order() {
        let mut decoder = AnthropicDecoder::new();

        let partials = feed(
            &mut decoder,
            &[
                json!({"type": "message_start", "message": {"usage": {"input_tokens": 12, "output_tokens": 1}}}),
                json!({"type": "content_block_start", "index": 2, "content_block": {"type": "tool_use", "id": "toolu_9", "name": "get_kline_data"}}),
                json!({"type": "content_block_start", "index": 1, "content_block": {"type": "text", "text": ""}}),
                json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": "{\"code\":"}}),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
                json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": "放量"}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "量价"}}),
                json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": "\"sh600519\"}"}}),
                json!({"type": "content_block_stop", "index": 2}),
                json!({"type": "content_block_stop", "index": 1}),
                json!({"type": "content_block_stop", "index": 0}),
                json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 40}}),
                json!({"type": "message_stop"}),
            ],
        );

        assert_eq!(
            partials,
            vec![
                GenerateResponse::Partial(Delta::Text("放量".into())),
                GenerateResponse::Partial(Delta::Thought("量价".into())),
                GenerateResponse::Partial(Delta::FunctionCall(FunctionCall {
                    id: "toolu_9".into(),
                    name: "get_kline_data".into(),
                    args: json!({"code": "sh600519"}),
                })),
            ]
        );

        let aggregate = decoder.finish().unwrap();

        assert_eq!(aggregate.parts[0], Part::thought("量价"));
        assert_eq!(aggregate.parts[1], Part::text("放量"));
        assert!(matches!(&aggregate.parts[2], Part::FunctionCall(c) if c.id == "toolu_9"));
        assert_eq!(aggregate.finish_reason, FinishReason::Stop);
        assert_eq!(aggregate.usage, Some(Usage::new(12, 40)));
        assert!(aggregate.turn_complete);
    }

    #[test]
    fn error_event_ends_the_stream() {
        let mut decoder = AnthropicDecoder::new();
        let data = json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}});

        let err = decoder.on_event("error", &data.to_string()).unwrap_err();

        assert!(matches!(err, LlmError::Protocol(msg) if msg == "anthropic API error: overloaded_error - Overloaded"));
    }

    #[test]
    fn malformed_event_is_a_protocol_error() {
        let mut decoder = AnthropicDecoder::new();
        assert!(matches!(
            decoder.on_event("message", "{not json"),
            Err(LlmError::Protocol(_))
        ));
    }

    #[test]
    fn unknown_events_are_ignored() {
        let mut decoder = AnthropicDecoder::new();
        let out = decoder
            .on_event("message", &json!({"type": "brand_new_event"}).to_string())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn stop_reasons() {
        assert_eq!(finish_reason(Some("end_turn")), FinishReason::Stop);
        assert_eq!(finish_reason(Some("stop_sequence")), FinishReason::Stop);
        assert_eq!(finish_reason(Some("max_tokens")), FinishReason::MaxTokens);
        assert_eq!(finish_reason(Some("pause_turn")), FinishReason::Unspecified);
        assert_eq!(finish_reason(None), FinishReason::Unspecified);
    }

    #[test]
    fn non_streaming_response_keeps_block_order() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "答"},
                {"type": "tool_use", "id": "t1", "name": "n", "input": {}}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 4}
        }))
        .unwrap();

        let aggregate = Aggregate::from(response);

        assert_eq!(aggregate.parts.len(), 3);
        assert_eq!(aggregate.text(), "答");
        assert_eq!(aggregate.usage.unwrap().total_tokens, 7);
    }
}
