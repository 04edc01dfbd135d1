//! In-process tools

pub mod market;

use std::sync::Arc;

use async_trait::async_trait;
use council_llm::ToolDeclaration;
use indexmap::IndexMap;

use crate::error::ToolError;

/// A tool implemented in this process
#[async_trait]
pub trait BuiltinTool: Send + Sync {
    /// Name the model calls the tool by
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> serde_json::Value;

    /// Run the tool, returning the text handed back to the model
    async fn call(&self, args: serde_json::Value) -> Result<String, ToolError>;

    /// Declaration merged into a model request
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameters(),
        }
    }
}

/// Named built-in tools
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn BuiltinTool>>,
}

impl ToolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the market tools backed by `market`
    pub fn with_market_data(market: Arc<dyn market::MarketData>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(market::StockRealtimeTool::new(market)));
        registry
    }

    /// Add a tool, replacing any tool of the same name
    pub fn register(&mut self, tool: Arc<dyn BuiltinTool>) {
        self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn BuiltinTool>> {
        self.tools.get(name).cloned()
    }

    /// Resolve the tools an agent is allowed, skipping unknown names
    pub fn select(&self, names: &[String]) -> Vec<Arc<dyn BuiltinTool>> {
        names
            .iter()
            .filter_map(|name| {
                let tool = self.get(name);
                if tool.is_none() {
                    tracing::warn!(tool = %name, "unknown built-in tool, skipping");
                }
                tool
            })
            .collect()
    }

    /// Registered tool names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::market::StaticMarketData;

    #[test]
    fn select_skips_unknown_names() {
        let registry = ToolRegistry::with_market_data(Arc::new(StaticMarketData::default()));

        let selected = registry.select(&["get_stock_realtime".into(), "get_kline_data".into()]);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name(), "get_stock_realtime");
        assert_eq!(registry.names().collect::<Vec<_>>(), ["get_stock_realtime"]);
    }
}
