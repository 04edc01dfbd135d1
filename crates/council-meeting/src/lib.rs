//! Multi-agent meeting orchestration for council
//!
//! A user query about a stock is answered by a panel of expert agents,
//! either the ones addressed with `@` or a set chosen by a moderator, over
//! one or more concurrent rounds. Replies are persisted per topic and fed
//! to long-term memory.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod agents;
pub mod error;
mod events;
pub mod instruction;
pub mod message;
pub mod moderator;
pub mod orchestrator;
pub mod registry;
#[cfg(test)]
mod testing;
pub mod transcript;
mod turn;

pub use agents::{Panel, default_agents};
pub use error::MeetingError;
pub use message::{
    ChatMessage, MeetingEvent, MeetingRequest, MessageKind, Position, Progress, ProgressKind, USER_AGENT_ID,
    USER_AGENT_NAME,
};
pub use orchestrator::{Collaborators, MeetingOutcome, Orchestrator};
pub use registry::{MeetingGuard, MeetingRegistry};
pub use transcript::TranscriptStore;
pub use turn::AgentReply;
