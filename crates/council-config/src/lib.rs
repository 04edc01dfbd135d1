//! Configuration for the council workspace
//!
//! A single TOML document describes model bindings, external tool servers,
//! long-term memory limits, the expert panel and where artifacts are stored.

#![allow(clippy::must_use_candidate)]

mod env;
pub mod llm;
mod loader;
pub mod mcp;
pub mod meeting;
pub mod memory;
pub mod storage;
pub mod telemetry;

use serde::Deserialize;

pub use llm::*;
pub use mcp::*;
pub use meeting::*;
pub use memory::*;
pub use storage::*;
pub use telemetry::*;

/// Top-level council configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Model bindings
    #[serde(default)]
    pub llm: LlmConfig,
    /// External tool servers
    #[serde(default)]
    pub mcp: McpConfig,
    /// Per-topic long-term memory
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Meeting orchestration and the expert panel
    #[serde(default)]
    pub meeting: MeetingConfig,
    /// Transcript and memory storage
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging output
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
