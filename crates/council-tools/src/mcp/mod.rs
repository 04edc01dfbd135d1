//! Per-call MCP toolsets
//!
//! Sessions are not pooled: each [`McpManager::toolsets_for`] call opens a
//! fresh session per server, and the session closes once its [`Toolset`]
//! and every [`McpTool`] taken from it are dropped.

mod client;

use std::borrow::Cow;
use std::sync::Arc;

use council_config::{McpConfig, McpServerType};
use council_llm::ToolDeclaration;
use indexmap::IndexMap;
use rmcp::model::{CallToolRequestParam, RawContent};
use rmcp::service::{RoleClient, RunningService};

use crate::error::ToolError;
use crate::name::prefix;

/// Registered MCP servers, connected on demand
#[derive(Debug, Clone, Default)]
pub struct McpManager {
    servers: IndexMap<String, ServerEntry>,
}

#[derive(Debug, Clone)]
struct ServerEntry {
    label: String,
    server_type: McpServerType,
}

impl McpManager {
    /// Register every enabled server
    pub fn new(config: &McpConfig) -> Self {
        let servers = config
            .enabled()
            .map(|(id, server)| {
                (
                    id.to_owned(),
                    ServerEntry {
                        label: server.label(id).to_owned(),
                        server_type: server.server_type.clone(),
                    },
                )
            })
            .collect();
        Self { servers }
    }

    /// Namespace label of a registered server
    pub fn label(&self, id: &str) -> Option<&str> {
        self.servers.get(id).map(|entry| entry.label.as_str())
    }

    /// Open one toolset per requested server
    ///
    /// Unknown ids and servers that fail to connect or list are logged and
    /// skipped.
    pub async fn toolsets_for(&self, ids: &[String]) -> Vec<Toolset> {
        let opened = futures_util::future::join_all(ids.iter().map(|id| self.open(id))).await;

        let toolsets: Vec<Toolset> = opened
            .into_iter()
            .zip(ids)
            .filter_map(|(result, id)| match result {
                Ok(toolset) => Some(toolset),
                Err(e) => {
                    tracing::warn!(server = %id, error = %e, "MCP server unavailable, skipping");
                    None
                }
            })
            .collect();

        tracing::debug!(requested = ids.len(), opened = toolsets.len(), "MCP toolsets opened");
        toolsets
    }

    /// Open a fresh session to one server and list its tools
    pub async fn open(&self, id: &str) -> Result<Toolset, ToolError> {
        let entry = self.servers.get(id).ok_or_else(|| ToolError::NotFound {
            name: format!("MCP server {id}"),
        })?;

        let service = client::connect(&entry.server_type).await?;
        let listed = service
            .list_all_tools()
            .await
            .map_err(|e| ToolError::Transport(format!("list_tools failed on {}: {e}", entry.label)))?;

        let session = Arc::new(Session {
            service,
            label: entry.label.clone(),
        });
        let tools = listed
            .into_iter()
            .map(|tool| McpTool {
                server: entry.label.clone(),
                name: tool.name.to_string(),
                description: tool.description.as_deref().unwrap_or_default().to_owned(),
                input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
                session: Arc::clone(&session),
            })
            .collect::<Vec<_>>();

        tracing::debug!(server = %entry.label, tools = tools.len(), "connected to MCP server");

        Ok(Toolset {
            server_id: id.to_owned(),
            session,
            tools,
        })
    }
}

struct Session {
    service: RunningService<RoleClient, ()>,
    label: String,
}

/// Tools of one server sharing one open session
pub struct Toolset {
    server_id: String,
    session: Arc<Session>,
    tools: Vec<McpTool>,
}

impl Toolset {
    /// Configured id of the server
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Namespace label of the server
    pub fn label(&self) -> &str {
        &self.session.label
    }

    /// Tools listed by the server
    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    /// Close the session
    ///
    /// When tools taken from this toolset are still alive the session stays
    /// open until the last of them is dropped.
    pub async fn shutdown(self) {
        let Self { session, tools, .. } = self;
        drop(tools);
        match Arc::try_unwrap(session) {
            Ok(session) => {
                if let Err(e) = session.service.cancel().await {
                    tracing::debug!(server = %session.label, error = %e, "MCP session shutdown failed");
                }
            }
            Err(_) => tracing::debug!("MCP session still in use, closing on drop"),
        }
    }
}

/// One tool on an MCP server
#[derive(Clone)]
pub struct McpTool {
    /// Namespace label of the serving server
    pub server: String,
    /// Name on the server
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub input_schema: serde_json::Value,
    session: Arc<Session>,
}

impl std::fmt::Debug for McpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTool")
            .field("server", &self.server)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl McpTool {
    /// Name exposed to the model
    pub fn qualified_name(&self) -> String {
        prefix(&self.server, &self.name)
    }

    /// Declaration merged into a model request
    pub fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.qualified_name(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }

    /// Call the tool, returning its text content
    pub async fn call(&self, args: serde_json::Value) -> Result<String, ToolError> {
        let arguments = match args {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                return Err(ToolError::InvalidArguments {
                    tool: self.qualified_name(),
                    message: format!("expected an object, got {other}"),
                });
            }
        };

        let result = self
            .session
            .service
            .call_tool(CallToolRequestParam {
                name: Cow::Owned(self.name.clone()),
                arguments,
            })
            .await
            .map_err(|e| ToolError::Transport(format!("tool '{}' failed on {}: {e}", self.name, self.server)))?;

        let text = result
            .content
            .iter()
            .map(|c| match &c.raw {
                RawContent::Text(t) => t.text.clone(),
                other => serde_json::to_string(other).unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error.unwrap_or(false) {
            return Err(ToolError::Execution(text));
        }
        Ok(text)
    }
}
