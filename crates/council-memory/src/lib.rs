//! Per-topic long-term memory
//!
//! Each topic keeps a bounded list of key facts, a verbatim window of
//! recent rounds and a rolling summary. Rounds that fall out of the window
//! are condensed by a [`Summarizer`] once enough of them pile up.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod error;
pub mod manager;
pub mod model;
pub mod relevance;
pub mod store;
pub mod summarizer;

pub use error::MemoryError;
pub use manager::MemoryManager;
pub use model::{FactKind, KeyFact, MemoryContext, RoundEntry, RoundRecord, TopicMemory};
pub use store::{MemoryStore, file_stem};
pub use summarizer::{Condensed, FactDraft, LlmSummarizer, Summarizer};
