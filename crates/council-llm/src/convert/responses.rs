//! Conversion between unified types and the `OpenAI` Responses API

use std::sync::Arc;

use crate::aggregate::{BlockAggregator, assemble_reply, parse_args};
use crate::error::LlmError;
use crate::protocol::responses::{
    ResponsesArgumentsDelta, ResponsesCompleted, ResponsesInputItem, ResponsesItemEvent, ResponsesOutputContent,
    ResponsesOutputItem, ResponsesRequest, ResponsesResponse, ResponsesStreamError, ResponsesTextDelta, ResponsesTool,
    ResponsesTypedItem, ResponsesUsage,
};
use crate::sse::{StreamDecoder, parse_event};
use crate::think::{SplitText, split_think};
use crate::types::{Aggregate, Delta, FinishReason, FunctionCall, GenerateRequest, GenerateResponse, Part, Role, Usage};
use crate::vendor::VendorToolCallParser;

// -- Outbound --

/// Build a Responses API request for `model`
pub fn to_responses_request(request: &GenerateRequest, model: &str, stream: bool) -> ResponsesRequest {
    let mut input = Vec::new();

    for turn in request.normalized_turns() {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "assistant",
        };
        let mut text = String::new();
        let mut items = Vec::new();

        for part in turn.parts {
            match part {
                Part::Text { text: t } => text.push_str(&t),
                Part::FunctionCall(call) => items.push(ResponsesInputItem::Typed(ResponsesTypedItem::FunctionCall {
                    arguments: call.args.to_string(),
                    call_id: call.id,
                    name: call.name,
                })),
                Part::FunctionResponse(response) => {
                    items.push(ResponsesInputItem::Typed(ResponsesTypedItem::FunctionCallOutput {
                        output: response.response_text(),
                        call_id: response.id,
                    }));
                }
                Part::Thought { .. } => {}
            }
        }

        let message = (!text.is_empty()).then(|| ResponsesInputItem::Message {
            role: role.to_owned(),
            content: text,
        });

        // A model's words precede its calls; results precede the user's follow-up
        match turn.role {
            Role::Model => {
                input.extend(message);
                input.extend(items);
            }
            Role::User => {
                input.extend(items);
                input.extend(message);
            }
        }
    }

    ResponsesRequest {
        model: model.to_owned(),
        input,
        instructions: request.system_text().map(str::to_owned),
        temperature: request.params.temperature,
        top_p: request.params.top_p,
        max_output_tokens: request.params.max_output_tokens,
        tools: request
            .tools
            .iter()
            .map(|tool| ResponsesTool {
                tool_type: "function".to_owned(),
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            })
            .collect(),
        stream,
    }
}

// -- Inbound --

fn usage(u: ResponsesUsage) -> Usage {
    Usage {
        input_tokens: u.input_tokens,
        output_tokens: u.output_tokens,
        total_tokens: u.total_tokens,
    }
}

/// Convert a complete response
pub fn aggregate_from_response(response: ResponsesResponse, vendor: &dyn VendorToolCallParser) -> Aggregate {
    let mut text = String::new();
    let mut native_calls = Vec::new();

    for item in response.output {
        match item {
            ResponsesOutputItem::Message { content } => {
                for piece in content {
                    if let ResponsesOutputContent::OutputText { text: t } = piece {
                        text.push_str(&t);
                    }
                }
            }
            ResponsesOutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => native_calls.push(Part::FunctionCall(FunctionCall {
                args: parse_args(&name, &arguments),
                id: call_id,
                name,
            })),
            ResponsesOutputItem::Other => {}
        }
    }

    if text.is_empty()
        && let Some(output_text) = response.output_text
    {
        text = output_text;
    }

    let (thought, reply) = split_think(&text);

    Aggregate {
        parts: assemble_reply(&thought, &reply, native_calls, vendor),
        finish_reason: FinishReason::Stop,
        usage: response.usage.map(usage),
        turn_complete: true,
    }
}

// -- Streaming --

#[derive(serde::Deserialize)]
struct EventKind {
    #[serde(rename = "type", default)]
    kind: String,
}

/// Tracks Responses API stream state across events
pub struct ResponsesDecoder {
    text: SplitText,
    calls: BlockAggregator,
    usage: Option<ResponsesUsage>,
    vendor: Arc<dyn VendorToolCallParser>,
}

impl ResponsesDecoder {
    /// Decoder that runs `vendor` over the final text
    pub fn new(vendor: Arc<dyn VendorToolCallParser>) -> Self {
        Self {
            text: SplitText::new(),
            calls: BlockAggregator::new(),
            usage: None,
            vendor,
        }
    }

    fn on_item(&mut self, data: &str, done: bool) -> Result<Vec<GenerateResponse>, LlmError> {
        let ResponsesItemEvent { item } = parse_event(data)?;
        if item.item_type != "function_call" {
            return Ok(Vec::new());
        }

        let index = self.calls.index_for(&item.id);
        self.calls.start_tool_call(index, &item.call_id, &item.name);

        if !done {
            return Ok(Vec::new());
        }
        if !item.arguments.is_empty() {
            self.calls.set_args(index, &item.arguments);
        }
        Ok(self
            .calls
            .function_call(index)
            .map(|call| GenerateResponse::Partial(Delta::FunctionCall(call)))
            .into_iter()
            .collect())
    }
}

impl StreamDecoder for ResponsesDecoder {
    fn on_event(&mut self, event: &str, data: &str) -> Result<Vec<GenerateResponse>, LlmError> {
        let kind = if event.is_empty() || event == "message" {
            parse_event::<EventKind>(data)?.kind
        } else {
            event.to_owned()
        };

        match kind.as_str() {
            "response.output_text.delta" => {
                let ResponsesTextDelta { delta } = parse_event(data)?;
                Ok(self.text.feed(&delta).into_iter().map(GenerateResponse::Partial).collect())
            }
            "response.function_call_arguments.delta" => {
                let ResponsesArgumentsDelta { item_id, delta } = parse_event(data)?;
                if let Some(index) = self.calls.known_index(&item_id) {
                    self.calls.push_args(index, &delta);
                }
                Ok(Vec::new())
            }
            "response.output_item.added" => self.on_item(data, false),
            "response.output_item.done" => self.on_item(data, true),
            "response.completed" => {
                let ResponsesCompleted { response } = parse_event(data)?;
                if let Some(u) = response.usage {
                    self.usage = Some(u);
                }
                Ok(Vec::new())
            }
            "error" | "response.failed" => {
                let failure: ResponsesStreamError = parse_event(data).unwrap_or_default();
                let detail = failure.response.and_then(|r| r.error);
                let code = failure
                    .code
                    .or_else(|| detail.as_ref().and_then(|d| d.code.clone()))
                    .unwrap_or_else(|| "unknown".to_owned());
                let message = failure
                    .message
                    .or_else(|| detail.map(|d| d.message))
                    .unwrap_or_default();
                Err(LlmError::Protocol(format!("responses API error: {code} - {message}")))
            }
            _ => Ok(Vec::new()),
        }
    }

    fn drain(&mut self) -> Vec<GenerateResponse> {
        self.text.flush().into_iter().map(GenerateResponse::Partial).collect()
    }

    fn finish(&mut self) -> Result<Aggregate, LlmError> {
        let native_calls = std::mem::take(&mut self.calls).finish();
        Ok(Aggregate {
            parts: assemble_reply(&self.text.thought, &self.text.text, native_calls, self.vendor.as_ref()),
            finish_reason: FinishReason::Stop,
            usage: self.usage.map(usage),
            turn_complete: true,
        })
    }
}
