//! Tool invocation layer
//!
//! Built-in tools and tools served by MCP servers share one call surface.
//! MCP tools are namespaced as `<server>:<tool>` so identically named tools
//! on different servers never collide.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod builtin;
pub mod error;
pub mod mcp;
pub mod name;
pub mod source;

pub use builtin::market::{MarketData, MarketIndex, StaticMarketData, StockSnapshot};
pub use builtin::{BuiltinTool, ToolRegistry};
pub use error::ToolError;
pub use mcp::{McpManager, McpTool, Toolset};
pub use name::{prefix, unprefix};
pub use source::{ToolBox, ToolSource};
