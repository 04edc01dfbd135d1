use serde::{Deserialize, Serialize};

/// Logical speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The caller, including tool results sent back to the model
    User,
    /// The model
    Model,
}

/// One piece of turn content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text
    Text {
        /// The text
        text: String,
    },
    /// Reasoning text; never sent back to a backend
    Thought {
        /// The reasoning text
        text: String,
    },
    /// A tool invocation requested by the model
    FunctionCall(FunctionCall),
    /// The result of a tool invocation
    FunctionResponse(FunctionResponse),
}

impl Part {
    /// Plain text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Reasoning part
    pub fn thought(text: impl Into<String>) -> Self {
        Self::Thought { text: text.into() }
    }

    /// Whether this part is reasoning text
    pub const fn is_thought(&self) -> bool {
        matches!(self, Self::Thought { .. })
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Call identifier echoed back in the response
    pub id: String,
    /// Tool name as declared in the request
    pub name: String,
    /// Arguments object
    pub args: serde_json::Value,
}

/// The result of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Identifier of the call this answers
    pub id: String,
    /// Tool name
    pub name: String,
    /// Result payload
    pub response: serde_json::Value,
}

impl FunctionResponse {
    /// Result payload rendered as text for backends that only take strings
    pub fn response_text(&self) -> String {
        match &self.response {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A message from one speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker
    pub role: Role,
    /// Content in order
    pub parts: Vec<Part>,
}

impl Turn {
    /// A user turn holding a single text part
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// A model turn
    pub const fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// Sampling parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold
    pub top_p: Option<f32>,
    /// Output token limit
    pub max_output_tokens: Option<u32>,
    /// Stop sequences
    pub stop_sequences: Vec<String>,
}

/// A tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Unique tool name
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON schema for the arguments object
    pub parameters: serde_json::Value,
}

/// A backend-independent generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Conversation so far
    pub turns: Vec<Turn>,
    /// System instruction
    pub system_instruction: Option<String>,
    /// Sampling parameters
    pub params: GenerationParams,
    /// Tools the model may call
    pub tools: Vec<ToolDeclaration>,
}

impl GenerateRequest {
    /// Turns ready for transmission
    ///
    /// Thought parts are removed, turns left empty are dropped, and
    /// consecutive turns from the same speaker are merged so roles strictly
    /// alternate.
    pub fn normalized_turns(&self) -> Vec<Turn> {
        let mut merged: Vec<Turn> = Vec::with_capacity(self.turns.len());

        for turn in &self.turns {
            let parts: Vec<Part> = turn.parts.iter().filter(|p| !p.is_thought()).cloned().collect();
            if parts.is_empty() {
                continue;
            }

            match merged.last_mut() {
                Some(last) if last.role == turn.role => last.parts.extend(parts),
                _ => merged.push(Turn { role: turn.role, parts }),
            }
        }

        merged
    }

    /// Copy of this request with the system instruction folded into the
    /// first user turn, for backends that ignore the system channel
    pub fn with_system_folded(&self) -> Self {
        let mut folded = self.clone();
        let Some(system) = folded.system_instruction.take().filter(|s| !s.is_empty()) else {
            return folded;
        };

        match folded.turns.iter_mut().find(|t| t.role == Role::User) {
            Some(turn) => turn.parts.insert(0, Part::text(format!("{system}\n\n"))),
            None => folded.turns.insert(0, Turn::user_text(system)),
        }

        folded
    }

    /// System instruction, `None` when unset or blank
    pub fn system_text(&self) -> Option<&str> {
        self.system_instruction.as_deref().filter(|s| !s.is_empty())
    }
}
