//! Conversion between unified types and Google Gemini wire format

use crate::aggregate::BlockAggregator;
use crate::error::LlmError;
use crate::protocol::google::{
    GoogleContent, GoogleFunctionCall, GoogleFunctionDeclaration, GoogleFunctionResponse, GoogleGenerationConfig,
    GooglePart, GoogleRequest, GoogleResponse, GoogleTool, GoogleUsageMetadata,
};
use crate::sse::{StreamDecoder, parse_event};
use crate::types::{Aggregate, Delta, FinishReason, GenerateRequest, GenerateResponse, GenerationParams, Part, Role, Usage};

// -- Outbound --

impl From<&GenerateRequest> for GoogleRequest {
    fn from(request: &GenerateRequest) -> Self {
        let contents = request
            .normalized_turns()
            .into_iter()
            .map(|turn| GoogleContent {
                role: Some(
                    match turn.role {
                        Role::User => "user",
                        Role::Model => "model",
                    }
                    .to_owned(),
                ),
                parts: turn.parts.into_iter().filter_map(part_to_google).collect(),
            })
            .filter(|content| !content.parts.is_empty())
            .collect();

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![GoogleTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|tool| GoogleFunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    })
                    .collect(),
            }]
        };

        Self {
            contents,
            system_instruction: request.system_text().map(|text| GoogleContent {
                role: None,
                parts: vec![GooglePart {
                    text: Some(text.to_owned()),
                    ..Default::default()
                }],
            }),
            generation_config: generation_config(&request.params),
            tools,
        }
    }
}

fn generation_config(params: &GenerationParams) -> Option<GoogleGenerationConfig> {
    if *params == GenerationParams::default() {
        return None;
    }
    Some(GoogleGenerationConfig {
        temperature: params.temperature,
        top_p: params.top_p,
        max_output_tokens: params.max_output_tokens,
        stop_sequences: params.stop_sequences.clone(),
    })
}

fn part_to_google(part: Part) -> Option<GooglePart> {
    match part {
        Part::Text { text } if !text.is_empty() => Some(GooglePart {
            text: Some(text),
            ..Default::default()
        }),
        Part::Text { .. } | Part::Thought { .. } => None,
        Part::FunctionCall(call) => Some(GooglePart {
            function_call: Some(GoogleFunctionCall {
                id: (!call.id.is_empty()).then_some(call.id),
                name: call.name,
                args: call.args,
            }),
            ..Default::default()
        }),
        Part::FunctionResponse(response) => {
            // Gemini only accepts an object here
            let payload = match response.response {
                value @ serde_json::Value::Object(_) => value,
                other => serde_json::json!({ "result": other }),
            };
            Some(GooglePart {
                function_response: Some(GoogleFunctionResponse {
                    id: (!response.id.is_empty()).then_some(response.id),
                    name: response.name,
                    response: payload,
                }),
                ..Default::default()
            })
        }
    }
}

// -- Inbound --

/// Map a Gemini finish reason
pub fn finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => FinishReason::Safety,
        _ => FinishReason::Unspecified,
    }
}

const fn usage(u: GoogleUsageMetadata) -> Usage {
    Usage {
        input_tokens: u.prompt_token_count,
        output_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Text,
    Thought,
}

/// Tracks Gemini stream state; also used for complete responses
///
/// Gemini sends whole parts per chunk. Consecutive text of the same kind
/// extends the current block; a change of kind or a function call opens a
/// new one.
#[derive(Debug, Default)]
pub struct GoogleDecoder {
    blocks: BlockAggregator,
    open: Option<(usize, Channel)>,
    next_index: usize,
    calls_seen: usize,
    finish_reason: Option<String>,
    usage: Option<GoogleUsageMetadata>,
}

impl GoogleDecoder {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    fn claim_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn text_index(&mut self, channel: Channel) -> usize {
        match self.open {
            Some((index, open)) if open == channel => index,
            _ => {
                let index = self.claim_index();
                self.open = Some((index, channel));
                index
            }
        }
    }

    /// Apply one response chunk
    pub fn apply(&mut self, chunk: GoogleResponse) -> Result<Vec<GenerateResponse>, LlmError> {
        if let Some(error) = chunk.error {
            return Err(LlmError::Protocol(format!(
                "google API error: {} - {}",
                error.status, error.message
            )));
        }
        if let Some(u) = chunk.usage_metadata {
            self.usage = Some(u);
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(Vec::new());
        };
        if candidate.finish_reason.is_some() {
            self.finish_reason = candidate.finish_reason;
        }

        let mut out = Vec::new();
        for part in candidate.content.parts {
            if let Some(call) = part.function_call {
                self.open = None;
                let index = self.claim_index();
                let id = call.id.unwrap_or_else(|| format!("{}_{}", call.name, self.calls_seen));
                self.calls_seen += 1;
                self.blocks.start_tool_call(index, &id, &call.name);
                self.blocks.set_args(index, &call.args.to_string());
                if let Some(call) = self.blocks.function_call(index) {
                    out.push(GenerateResponse::Partial(Delta::FunctionCall(call)));
                }
            } else if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                if part.thought {
                    let index = self.text_index(Channel::Thought);
                    self.blocks.push_thought(index, &text);
                    out.push(GenerateResponse::Partial(Delta::Thought(text)));
                } else {
                    let index = self.text_index(Channel::Text);
                    self.blocks.push_text(index, &text);
                    out.push(GenerateResponse::Partial(Delta::Text(text)));
                }
            }
        }

        Ok(out)
    }
}

impl StreamDecoder for GoogleDecoder {
    fn on_event(&mut self, _event: &str, data: &str) -> Result<Vec<GenerateResponse>, LlmError> {
        let chunk = parse_event::<GoogleResponse>(data)?;
        self.apply(chunk)
    }

    fn finish(&mut self) -> Result<Aggregate, LlmError> {
        Ok(Aggregate {
            parts: std::mem::take(&mut self.blocks).finish(),
            finish_reason: finish_reason(self.finish_reason.as_deref()),
            usage: self.usage.map(usage),
            turn_complete: true,
        })
    }
}

impl TryFrom<GoogleResponse> for Aggregate {
    type Error = LlmError;

    fn try_from(response: GoogleResponse) -> Result<Self, Self::Error> {
        let mut decoder = GoogleDecoder::new();
        decoder.apply(response)?;
        decoder.finish()
    }
}
