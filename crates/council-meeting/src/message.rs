//! Transcript messages and observer events

use council_tools::StockSnapshot;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Agent id of messages written by the user
pub const USER_AGENT_ID: &str = "user";
/// Display name of the user in transcripts
pub const USER_AGENT_NAME: &str = "老韭菜";

/// How a transcript message should be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Normal,
    /// Which tools an agent used in its turn
    ToolNotice,
    /// An agent failed to answer
    Error,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub agent_id: String,
    pub agent_name: String,
    #[serde(default)]
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    /// Round number; 0 for user messages
    #[serde(default)]
    pub round: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub(crate) fn new(agent_id: &str, agent_name: &str, role: &str, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_owned(),
            agent_name: agent_name.to_owned(),
            role: role.to_owned(),
            content,
            kind: MessageKind::Normal,
            round: 0,
            reply_to: None,
            mentions: Vec::new(),
            timestamp: Timestamp::now(),
        }
    }
}

/// Holding in the discussed stock
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub shares: u64,
    pub cost_price: f64,
}

/// A user query to the panel
#[derive(Debug, Clone, Default)]
pub struct MeetingRequest {
    /// Topic id, usually the stock code
    pub topic: String,
    pub stock: StockSnapshot,
    pub position: Option<Position>,
    pub query: String,
    /// Agents addressed explicitly, in addition to `@` mentions in the query
    pub mentions: Vec<String>,
    /// Message being replied to
    pub reply_to: Option<String>,
    /// Quoted content of the message being replied to
    pub reply_content: Option<String>,
}

/// Event sent to observers while a meeting runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeetingEvent {
    /// A message was persisted to the transcript
    Message { topic: String, message: ChatMessage },
    /// Transient progress of one agent turn
    Progress { topic: String, progress: Progress },
}

/// Progress of one agent turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub agent_id: String,
    pub round: u32,
    #[serde(flatten)]
    pub kind: ProgressKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressKind {
    AgentStart,
    ToolCallStart { tool: String, args: serde_json::Value },
    ToolCallEnd { tool: String, success: bool },
    Partial { text: String, thought: bool },
    AgentDone,
}
