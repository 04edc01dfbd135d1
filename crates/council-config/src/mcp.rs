use std::collections::HashMap;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// External tool server configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpConfig {
    /// MCP servers keyed by id
    #[serde(default)]
    pub servers: IndexMap<String, McpServerConfig>,
}

impl McpConfig {
    /// Servers that are switched on
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &McpServerConfig)> {
        self.servers
            .iter()
            .filter(|(_, server)| server.enabled)
            .map(|(id, server)| (id.as_str(), server))
    }
}

/// Configuration for a single MCP server
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpServerConfig {
    /// Label used to namespace this server's tools; defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    /// Whether agents may use this server
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Server transport
    #[serde(rename = "type")]
    pub server_type: McpServerType,
}

impl McpServerConfig {
    /// Tool namespace label for the server registered under `id`
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(id)
    }
}

const fn enabled_by_default() -> bool {
    true
}

/// MCP server transport types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpServerType {
    /// Child process speaking over stdio
    Stdio(StdioConfig),
    /// HTTP with SSE
    Sse(HttpConfig),
    /// HTTP with the streamable protocol
    StreamableHttp(HttpConfig),
}

/// STDIO transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StdioConfig {
    /// Command to execute
    pub command: String,
    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the child
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Server URL
    pub url: Url,
    /// Static bearer token
    #[serde(default)]
    pub token: Option<SecretString>,
}
