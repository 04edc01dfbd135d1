//! Scripted providers for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use council_llm::{
    Aggregate, Delta, FinishReason, FunctionCall, GenerateRequest, GenerateResponse, LlmError, Part, Provider,
    ProviderCapabilities, ResponseStream,
};
use council_tools::{BuiltinTool, ToolError};
use futures_util::stream;

/// What the next call answers with
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Text(&'static str),
    Call(&'static str, serde_json::Value),
    Fail(u16),
    /// Connection dropped before any reply
    Transport,
    /// Streams the text, then the connection drops before the final response
    Cut(&'static str),
    Hang,
}

/// Provider replaying a fixed script, then a fallback text
pub(crate) struct Scripted {
    name: &'static str,
    steps: Mutex<VecDeque<Step>>,
    fallback: &'static str,
    calls: AtomicU32,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl Scripted {
    pub(crate) fn new(name: &'static str, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            name,
            steps: Mutex::new(steps.into_iter().collect()),
            fallback: "好的",
            calls: AtomicU32::new(0),
            requests: Mutex::default(),
        }
    }

    pub(crate) fn replying(name: &'static str, text: &'static str) -> Self {
        Self {
            fallback: text,
            ..Self::new(name, [])
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn step(&self, request: &GenerateRequest) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.steps.lock().unwrap().pop_front().unwrap_or(Step::Text(self.fallback))
    }

    async fn answer(step: Step) -> Result<Aggregate, LlmError> {
        let part = match step {
            Step::Text(text) => Part::text(text),
            Step::Call(name, args) => Part::FunctionCall(FunctionCall {
                id: format!("call_{name}"),
                name: name.to_owned(),
                args,
            }),
            Step::Fail(status) => {
                return Err(LlmError::Status {
                    status,
                    body: "scripted failure".into(),
                });
            }
            Step::Transport | Step::Cut(_) => return Err(LlmError::Transport("connection reset".into())),
            Step::Hang => std::future::pending::<Part>().await,
        };

        Ok(Aggregate {
            parts: vec![part],
            finish_reason: FinishReason::Stop,
            usage: None,
            turn_complete: true,
        })
    }
}

#[async_trait]
impl Provider for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calling: true,
            system_role: true,
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Aggregate, LlmError> {
        Self::answer(self.step(request)).await
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> Result<ResponseStream, LlmError> {
        let step = self.step(request);
        if let Step::Cut(text) = step {
            let items = vec![
                Ok(GenerateResponse::Partial(Delta::Text(text.to_owned()))),
                Err(LlmError::Transport("connection reset mid-stream".into())),
            ];
            return Ok(Box::pin(stream::iter(items)));
        }

        let aggregate = Self::answer(step).await?;
        let mut items: Vec<Result<GenerateResponse, LlmError>> = aggregate
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(Delta::Text(text.clone())),
                Part::FunctionCall(call) => Some(Delta::FunctionCall(call.clone())),
                _ => None,
            })
            .map(|delta| Ok(GenerateResponse::Partial(delta)))
            .collect();
        items.push(Ok(GenerateResponse::Final(aggregate)));
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Built-in tool answering with a fixed text, or failing when `reply` is `None`
pub(crate) struct FixedTool {
    pub name: &'static str,
    pub reply: Option<&'static str>,
}

#[async_trait]
impl BuiltinTool for FixedTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "fixed test tool"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _args: serde_json::Value) -> Result<String, ToolError> {
        self.reply
            .map(str::to_owned)
            .ok_or_else(|| ToolError::Execution("upstream down".into()))
    }
}
