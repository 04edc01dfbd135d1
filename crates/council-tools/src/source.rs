//! Unified view over built-in and MCP tools

use std::sync::Arc;

use council_llm::ToolDeclaration;
use indexmap::IndexMap;

use crate::builtin::BuiltinTool;
use crate::error::ToolError;
use crate::mcp::{McpTool, Toolset};

/// Where a callable tool lives
#[derive(Clone)]
pub enum ToolSource {
    Builtin(Arc<dyn BuiltinTool>),
    Mcp(McpTool),
}

impl ToolSource {
    /// Name exposed to the model
    pub fn name(&self) -> String {
        match self {
            Self::Builtin(tool) => tool.name().to_owned(),
            Self::Mcp(tool) => tool.qualified_name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Builtin(tool) => tool.description(),
            Self::Mcp(tool) => &tool.description,
        }
    }

    /// Server label for MCP tools
    pub fn server(&self) -> Option<&str> {
        match self {
            Self::Builtin(_) => None,
            Self::Mcp(tool) => Some(&tool.server),
        }
    }

    pub fn declaration(&self) -> ToolDeclaration {
        match self {
            Self::Builtin(tool) => tool.declaration(),
            Self::Mcp(tool) => tool.declaration(),
        }
    }

    pub async fn call(&self, args: serde_json::Value) -> Result<String, ToolError> {
        match self {
            Self::Builtin(tool) => tool.call(args).await,
            Self::Mcp(tool) => tool.call(args).await,
        }
    }
}

/// Tools available to one agent turn, keyed by exposed name
#[derive(Clone, Default)]
pub struct ToolBox {
    tools: IndexMap<String, ToolSource>,
}

impl ToolBox {
    /// Merge built-in tools and the tools of opened MCP toolsets
    ///
    /// On a name clash the first entry wins.
    pub fn new(builtins: Vec<Arc<dyn BuiltinTool>>, toolsets: &[Toolset]) -> Self {
        let mut tools = IndexMap::new();
        let sources = builtins
            .into_iter()
            .map(ToolSource::Builtin)
            .chain(toolsets.iter().flat_map(|ts| ts.tools().iter().cloned().map(ToolSource::Mcp)));
        for source in sources {
            tools.entry(source.name()).or_insert(source);
        }
        Self { tools }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSource> {
        self.tools.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSource> {
        self.tools.values()
    }

    /// Declarations for a model request
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.values().map(ToolSource::declaration).collect()
    }

    /// Call a tool by exposed name
    pub async fn call(&self, name: &str, args: serde_json::Value) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound { name: name.to_owned() })?;
        tool.call(args).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::builtin::ToolRegistry;
    use crate::builtin::market::StaticMarketData;

    #[tokio::test]
    async fn calls_builtin_by_name_and_rejects_unknown() {
        let registry = ToolRegistry::with_market_data(Arc::new(StaticMarketData::default()));
        let toolbox = ToolBox::new(registry.select(&["get_stock_realtime".into()]), &[]);

        assert_eq!(toolbox.declarations().len(), 1);
        assert!(toolbox.call("get_stock_realtime", json!({"codes": []})).await.is_ok());
        assert!(matches!(
            toolbox.call("tavily:search", json!({})).await,
            Err(ToolError::NotFound { .. })
        ));
    }
}
