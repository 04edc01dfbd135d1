//! One agent's model and tool exchange

use std::sync::Arc;

use council_llm::{
    Aggregate, Delta, FunctionCall, FunctionResponse, GenerateRequest, GenerateResponse, LlmError, Part, Provider,
    Role, Turn,
};
use council_tools::{ToolBox, ToolError};
use futures_util::StreamExt;

use crate::error::MeetingError;
use crate::events::EventSink;
use crate::message::ProgressKind;

/// Final text of a turn and the tools it used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub content: String,
    pub tools_used: Vec<String>,
}

/// Streaming conversation of one agent with its model, executing tool calls
pub(crate) struct AgentTurn<'a> {
    pub agent_id: &'a str,
    pub round: u32,
    pub provider: Arc<dyn Provider>,
    pub tools: &'a ToolBox,
    pub instruction: &'a str,
    pub query: &'a str,
    pub max_tool_iterations: u32,
    pub events: &'a EventSink,
}

impl AgentTurn<'_> {
    pub(crate) async fn run(&self) -> Result<AgentReply, MeetingError> {
        let mut request = GenerateRequest {
            turns: vec![Turn::user_text(self.query)],
            system_instruction: Some(self.instruction.to_owned()),
            tools: self.tools.declarations(),
            ..GenerateRequest::default()
        };
        let mut tools_used: Vec<String> = Vec::new();

        for _ in 0..self.max_tool_iterations.max(1) {
            let aggregate = self.exchange(&request).await?;
            let calls: Vec<FunctionCall> = aggregate.function_calls().cloned().collect();

            if calls.is_empty() {
                let content = aggregate.text().trim().to_owned();
                if content.is_empty() {
                    return Err(LlmError::Protocol(format!("empty reply ({})", aggregate.finish_reason)).into());
                }
                return Ok(AgentReply { content, tools_used });
            }

            let mut responses = Vec::with_capacity(calls.len());
            for call in &calls {
                responses.push(Part::FunctionResponse(self.invoke(call).await?));
                if !tools_used.contains(&call.name) {
                    tools_used.push(call.name.clone());
                }
            }
            request.turns.push(Turn::model(aggregate.parts));
            request.turns.push(Turn {
                role: Role::User,
                parts: responses,
            });
        }

        Err(ToolError::Execution(format!(
            "tool call limit of {} exchanges reached",
            self.max_tool_iterations
        ))
        .into())
    }

    /// One streamed model call, forwarding partial output
    async fn exchange(&self, request: &GenerateRequest) -> Result<Aggregate, MeetingError> {
        let token = self.events.token();
        let mut stream = tokio::select! {
            biased;
            () = token.cancelled() => return Err(MeetingError::Cancelled),
            stream = self.provider.generate_content(request, true) => stream?,
        };

        loop {
            let item = tokio::select! {
                biased;
                () = token.cancelled() => return Err(MeetingError::Cancelled),
                item = stream.next() => item,
            };

            match item {
                Some(Ok(GenerateResponse::Final(aggregate))) => return Ok(aggregate),
                Some(Ok(GenerateResponse::Partial(Delta::Text(text)))) => {
                    self.progress(ProgressKind::Partial { text, thought: false }).await;
                }
                Some(Ok(GenerateResponse::Partial(Delta::Thought(text)))) => {
                    self.progress(ProgressKind::Partial { text, thought: true }).await;
                }
                Some(Ok(GenerateResponse::Partial(Delta::FunctionCall(_)))) => {}
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(LlmError::Protocol("stream ended without a final response".into()).into());
                }
            }
        }
    }

    /// Run one tool call; tool failures are reported back to the model
    async fn invoke(&self, call: &FunctionCall) -> Result<FunctionResponse, MeetingError> {
        self.progress(ProgressKind::ToolCallStart {
            tool: call.name.clone(),
            args: call.args.clone(),
        })
        .await;

        let token = self.events.token();
        let result = tokio::select! {
            biased;
            () = token.cancelled() => return Err(MeetingError::Cancelled),
            result = self.tools.call(&call.name, call.args.clone()) => result,
        };

        self.progress(ProgressKind::ToolCallEnd {
            tool: call.name.clone(),
            success: result.is_ok(),
        })
        .await;

        let response = match result {
            Ok(text) => serde_json::Value::String(text),
            Err(e) => {
                tracing::warn!(agent = %self.agent_id, tool = %call.name, error = %e, "tool call failed");
                serde_json::json!({ "error": e.to_string() })
            }
        };

        Ok(FunctionResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        })
    }

    async fn progress(&self, kind: ProgressKind) {
        self.events.progress(self.agent_id, self.round, kind).await;
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::message::MeetingEvent;
    use crate::testing::{FixedTool, Scripted, Step};

    fn toolbox() -> ToolBox {
        ToolBox::new(
            vec![
                Arc::new(FixedTool {
                    name: "get_kline_data",
                    reply: Some("MA5 above MA20"),
                }),
                Arc::new(FixedTool {
                    name: "get_news",
                    reply: None,
                }),
            ],
            &[],
        )
    }

    async fn run(provider: Arc<Scripted>, limit: u32) -> (Result<AgentReply, MeetingError>, Vec<MeetingEvent>) {
        let (tx, mut rx) = mpsc::channel(64);
        let events = EventSink::new("t", tx, CancellationToken::new());
        let tools = toolbox();
        let turn = AgentTurn {
            agent_id: "technical",
            round: 1,
            provider,
            tools: &tools,
            instruction: "be brief",
            query: "trend?",
            max_tool_iterations: limit,
            events: &events,
        };

        let result = turn.run().await;
        drop(turn);
        drop(events);
        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event);
        }
        (result, seen)
    }

    fn progress(events: &[MeetingEvent]) -> Vec<&ProgressKind> {
        events
            .iter()
            .filter_map(|event| match event {
                MeetingEvent::Progress { progress, .. } => Some(&progress.kind),
                MeetingEvent::Message { .. } => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn tool_results_are_fed_back() {
        let provider = Arc::new(Scripted::new(
            "p",
            [
                Step::Call("get_kline_data", serde_json::json!({"code": "600519"})),
                Step::Call("get_news", serde_json::json!({})),
                Step::Text("  均线多头排列  "),
            ],
        ));

        let (result, events) = run(Arc::clone(&provider), 8).await;

        let reply = result.unwrap();
        assert_eq!(reply.content, "均线多头排列");
        assert_eq!(reply.tools_used, ["get_kline_data", "get_news"]);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].system_instruction.as_deref(), Some("be brief"));
        assert_eq!(requests[0].tools.len(), 2);
        let Part::FunctionResponse(ok) = &requests[1].turns[2].parts[0] else {
            panic!("expected function response");
        };
        assert_eq!(ok.response, serde_json::json!("MA5 above MA20"));
        let Part::FunctionResponse(failed) = &requests[2].turns[4].parts[0] else {
            panic!("expected function response");
        };
        assert!(failed.response["error"].as_str().unwrap().contains("upstream down"));

        let kinds = progress(&events);
        assert!(kinds.contains(&&ProgressKind::ToolCallEnd {
            tool: "get_kline_data".into(),
            success: true,
        }));
        assert!(kinds.contains(&&ProgressKind::ToolCallEnd {
            tool: "get_news".into(),
            success: false,
        }));
        assert!(kinds.contains(&&ProgressKind::Partial {
            text: "  均线多头排列  ".into(),
            thought: false,
        }));
    }

    #[tokio::test]
    async fn tool_loop_is_bounded() {
        let provider = Arc::new(Scripted::new(
            "p",
            std::iter::repeat_n(Step::Call("get_kline_data", serde_json::json!({})), 5),
        ));

        let (result, _) = run(Arc::clone(&provider), 3).await;

        assert!(matches!(result, Err(MeetingError::Tool(ToolError::Execution(_)))));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let provider = Arc::new(Scripted::new("p", [Step::Text("   ")]));

        let (result, _) = run(provider, 8).await;

        assert!(matches!(result, Err(MeetingError::Llm(LlmError::Protocol(_)))));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hanging_call() {
        let provider: Arc<dyn Provider> = Arc::new(Scripted::new("p", [Step::Hang]));
        let (tx, _rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let events = EventSink::new("t", tx, token.clone());
        let tools = ToolBox::default();
        let turn = AgentTurn {
            agent_id: "risk",
            round: 1,
            provider,
            tools: &tools,
            instruction: "",
            query: "q",
            max_tool_iterations: 1,
            events: &events,
        };

        let canceller = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            token.cancel();
        };
        let (result, ()) = tokio::join!(turn.run(), canceller);

        assert!(matches!(result, Err(MeetingError::Cancelled)));
    }
}
