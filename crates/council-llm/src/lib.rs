//! Model adapter layer for council
//!
//! One request/response contract over several incompatible chat backends
//! (`OpenAI` Chat Completions and Responses, Anthropic Messages, Google
//! Gemini), including incremental decoding of their event streams.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod aggregate;
pub mod convert;
pub mod error;
pub mod probe;
pub mod protocol;
pub mod provider;
mod sse;
pub mod state;
pub mod think;
pub mod types;
pub mod vendor;

pub use error::LlmError;
pub use provider::{Provider, ProviderCapabilities, ResponseStream};
pub use state::{LlmState, build_provider, test_connection};
pub use types::{
    Aggregate, Delta, FinishReason, FunctionCall, FunctionResponse, GenerateRequest, GenerateResponse,
    GenerationParams, Part, Role, ToolDeclaration, Turn, Usage,
};
