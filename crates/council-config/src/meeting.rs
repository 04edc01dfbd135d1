use serde::Deserialize;

/// Meeting orchestration settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MeetingConfig {
    /// Binding used for the open-mode moderation pass
    pub moderator: Option<String>,
    /// Upper bound on discussion rounds the moderator may request
    pub max_rounds: u32,
    /// Upper bound on model/tool exchanges within one agent turn
    pub max_tool_iterations: u32,
    /// Capacity of the per-meeting event channel
    pub event_buffer: usize,
    /// Expert panel; the built-in panel is used when empty
    pub agents: Vec<AgentConfig>,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            moderator: None,
            max_rounds: 3,
            max_tool_iterations: 8,
            event_buffer: 64,
            agents: Vec::new(),
        }
    }
}

/// One expert agent
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Stable id used for `@` addressing
    pub id: String,
    /// Display name
    pub name: String,
    /// Role label
    pub role: String,
    /// Base instruction; a generic one is derived from name and role when empty
    #[serde(default)]
    pub instruction: String,
    /// Built-in tool names this agent may call
    #[serde(default)]
    pub tools: Vec<String>,
    /// MCP server ids this agent may call
    #[serde(default)]
    pub mcp_servers: Vec<String>,
    /// Whether the agent takes part in meetings
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Model binding id; the default binding is used when unset
    #[serde(default)]
    pub provider: Option<String>,
}

const fn enabled_by_default() -> bool {
    true
}
