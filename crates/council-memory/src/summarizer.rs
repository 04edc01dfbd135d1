//! Condensing old rounds into a summary and key facts

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use council_llm::{GenerateRequest, GenerationParams, Provider, Turn};
use serde::Deserialize;

use crate::error::MemoryError;
use crate::model::{FactKind, RoundRecord};

/// Output of one summarization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condensed {
    /// Summary of the condensed rounds only
    pub summary: String,
    pub facts: Vec<FactDraft>,
}

/// A key fact before it is timestamped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactDraft {
    pub text: String,
    pub kind: FactKind,
}

/// Turns discussion rounds into long-term memory
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Key facts stated in one freshly completed round
    async fn extract_facts(&self, topic: &str, round: &RoundRecord) -> Result<Vec<FactDraft>, MemoryError>;

    /// Summary and facts for rounds that left the verbatim window
    async fn condense(
        &self,
        topic: &str,
        previous_summary: &str,
        rounds: &[RoundRecord],
    ) -> Result<Condensed, MemoryError>;
}

/// Summarizer backed by a model binding
pub struct LlmSummarizer {
    provider: Arc<dyn Provider>,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    async fn ask(&self, prompt: String) -> Result<String, MemoryError> {
        let request = GenerateRequest {
            turns: vec![Turn::user_text(prompt)],
            system_instruction: Some(SUMMARIZER_INSTRUCTION.to_owned()),
            params: GenerationParams {
                temperature: Some(0.2),
                ..GenerationParams::default()
            },
            ..GenerateRequest::default()
        };

        let aggregate = self
            .provider
            .generate(&request)
            .await
            .map_err(|e| MemoryError::Summarizer(e.to_string()))?;
        Ok(aggregate.text())
    }
}

const SUMMARIZER_INSTRUCTION: &str = "你是一名会议记录员，负责把股票讨论压缩成简洁的长期记忆。只输出 JSON，不要输出其他内容。";

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn extract_facts(&self, topic: &str, round: &RoundRecord) -> Result<Vec<FactDraft>, MemoryError> {
        let reply = self.ask(build_extraction_prompt(topic, round)).await?;
        Ok(parse_condensed(&reply)?.facts)
    }

    async fn condense(
        &self,
        topic: &str,
        previous_summary: &str,
        rounds: &[RoundRecord],
    ) -> Result<Condensed, MemoryError> {
        let reply = self.ask(build_prompt(topic, previous_summary, rounds)).await?;
        parse_condensed(&reply)
    }
}

fn write_round(prompt: &mut String, round: &RoundRecord) {
    let _ = writeln!(prompt, "【第{}轮】用户提问：{}", round.round, round.query);
    for entry in &round.entries {
        let _ = writeln!(prompt, "{}（{}）：{}", entry.agent_name, entry.role, entry.content);
    }
}

fn build_extraction_prompt(topic: &str, round: &RoundRecord) -> String {
    let mut prompt = format!("话题：{topic}\n\n本轮讨论记录：\n");
    write_round(&mut prompt, round);
    prompt.push_str(
        "\n请提取值得长期记住的关键信息（最多5条），输出 JSON：{\"facts\": [{\"text\": \"一句话关键信息\", \
         \"kind\": \"fact|opinion|decision\"}]}",
    );
    prompt
}

fn build_prompt(topic: &str, previous_summary: &str, rounds: &[RoundRecord]) -> String {
    let mut prompt = format!("话题：{topic}\n\n");
    if !previous_summary.is_empty() {
        let _ = write!(prompt, "已有摘要：\n{previous_summary}\n\n");
    }
    prompt.push_str("需要压缩的讨论记录：\n");
    for round in rounds {
        write_round(&mut prompt, round);
    }
    prompt.push_str(
        "\n请输出 JSON：{\"summary\": \"不超过300字的讨论摘要\", \"facts\": [{\"text\": \"一句话关键信息\", \
         \"kind\": \"fact|opinion|decision\"}]}",
    );
    prompt
}

#[derive(Deserialize)]
struct RawCondensed {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    facts: Vec<RawFact>,
}

#[derive(Deserialize)]
struct RawFact {
    text: String,
    #[serde(default)]
    kind: Option<String>,
}

/// Parse the model's JSON reply, tolerating code fences and chatter
fn parse_condensed(reply: &str) -> Result<Condensed, MemoryError> {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return Err(MemoryError::Summarizer("reply contains no JSON object".into()));
    };
    if end < start {
        return Err(MemoryError::Summarizer("reply contains no JSON object".into()));
    }

    let raw: RawCondensed = serde_json::from_str(&reply[start..=end])
        .map_err(|e| MemoryError::Summarizer(format!("malformed summary JSON: {e}")))?;

    Ok(Condensed {
        summary: raw.summary.trim().to_owned(),
        facts: raw
            .facts
            .into_iter()
            .filter(|f| !f.text.trim().is_empty())
            .map(|f| FactDraft {
                text: f.text.trim().to_owned(),
                kind: f.kind.and_then(|k| k.parse().ok()).unwrap_or_default(),
            })
            .collect(),
    })
}
