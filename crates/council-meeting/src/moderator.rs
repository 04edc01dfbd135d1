//! Open-mode participant selection

use std::fmt::Write;

use council_config::AgentConfig;
use council_llm::{GenerateRequest, GenerationParams, Provider, Turn};
use council_tools::StockSnapshot;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::agents::Panel;
use crate::error::MeetingError;

const MODERATOR_INSTRUCTION: &str = "你是一场股票讨论会的主持人，负责根据用户的问题挑选最合适的专家发言，并决定讨论轮数。只输出 JSON，不要输出其他内容。";

/// Who speaks and for how many rounds
#[derive(Debug, Clone)]
pub struct Selection {
    pub agents: Vec<AgentConfig>,
    pub rounds: u32,
}

#[derive(Debug, Deserialize)]
struct ModeratorReply {
    #[serde(default)]
    agents: Vec<String>,
    #[serde(default)]
    rounds: Option<u32>,
}

/// Ask the moderator binding which agents should answer `query`
///
/// A failed call or an empty selection falls back to the whole enabled
/// panel for one round. Only cancellation is reported as an error.
pub async fn select(
    provider: &dyn Provider,
    panel: &Panel,
    stock: &StockSnapshot,
    query: &str,
    max_rounds: u32,
    token: &CancellationToken,
) -> Result<Selection, MeetingError> {
    let request = GenerateRequest {
        turns: vec![Turn::user_text(prompt(panel, stock, query, max_rounds))],
        system_instruction: Some(MODERATOR_INSTRUCTION.to_owned()),
        params: GenerationParams {
            temperature: Some(0.2),
            ..GenerationParams::default()
        },
        ..GenerateRequest::default()
    };

    let result = tokio::select! {
        biased;
        () = token.cancelled() => return Err(MeetingError::Cancelled),
        result = provider.generate(&request) => result,
    };

    let reply = match result {
        Ok(aggregate) => parse_reply(&aggregate.text()),
        Err(e) => {
            tracing::warn!(provider = %provider.name(), error = %e, "moderator call failed, inviting every agent");
            None
        }
    };

    Ok(resolve(panel, reply, max_rounds))
}

fn prompt(panel: &Panel, stock: &StockSnapshot, query: &str, max_rounds: u32) -> String {
    let mut prompt = format!("股票: {} ({})\n用户问题: {query}\n\n可选专家:\n", stock.symbol, stock.name);
    for agent in panel.enabled() {
        let _ = writeln!(prompt, "- {}: {}（{}）", agent.id, agent.name, agent.role);
    }
    let _ = write!(
        prompt,
        "\n请挑选与问题最相关的专家（通常2到4位），并给出讨论轮数（1到{max_rounds}，简单问题1轮即可）。\n按如下格式输出: {{\"agents\": [\"专家id\"], \"rounds\": 1}}"
    );
    prompt
}

fn parse_reply(text: &str) -> Option<ModeratorReply> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]) {
        Ok(reply) => Some(reply),
        Err(e) => {
            tracing::warn!(error = %e, "moderator reply is not valid json");
            None
        }
    }
}

fn resolve(panel: &Panel, reply: Option<ModeratorReply>, max_rounds: u32) -> Selection {
    let max_rounds = max_rounds.max(1);
    if let Some(reply) = reply {
        let agents = panel.select(&reply.agents);
        if !agents.is_empty() {
            return Selection {
                agents,
                rounds: reply.rounds.unwrap_or(1).clamp(1, max_rounds),
            };
        }
    }

    Selection {
        agents: panel.enabled().cloned().collect(),
        rounds: 1,
    }
}
