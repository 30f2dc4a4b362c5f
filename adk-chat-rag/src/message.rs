//! Conversation turns and chat history normalization.
//!
//! Callers supply history in one of three shapes. [`ChatHistory::from_value`]
//! detects the shape once and [`ChatHistory::into_transcript`] turns it into
//! the line-prefixed transcript the condenser and synthesizer consume:
//!
//! - a list of [`Turn`] objects (`{"role": "human", "content": "..."}`)
//! - the deprecated flat string list, where even positions are human turns
//!   and odd positions are assistant turns (nested pairs are flattened first)
//! - an already formatted transcript string, used verbatim

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{RagError, Result};

/// The speaker of a [`Turn`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// The end user.
    Human,
    /// The model answering the user.
    Assistant,
    /// Any other speaker (system, tool, ...). The label is kept for
    /// round-tripping but is not rendered in transcripts.
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "human" | "user" => Role::Human,
            "ai" | "assistant" => Role::Assistant,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Human => "human".to_string(),
            Role::Assistant => "ai".to_string(),
            Role::Other(label) => label,
        }
    }
}

/// One speaker's contribution to a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl Turn {
    /// A turn spoken by the user.
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: Role::Human, content: content.into() }
    }

    /// A turn spoken by the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    /// A turn spoken by some other role.
    pub fn other(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: Role::Other(label.into()), content: content.into() }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Human => write!(f, "Human: {}", self.content),
            Role::Assistant => write!(f, "Assistant: {}", self.content),
            Role::Other(_) => f.write_str(&self.content),
        }
    }
}

/// An ordered, chronological sequence of [`Turn`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Wrap an ordered list of turns.
    pub fn new(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// Build a conversation from the legacy flat form: even positions are
    /// human turns, odd positions are assistant turns.
    pub fn from_legacy_pairwise<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let turns = messages
            .into_iter()
            .enumerate()
            .map(|(i, m)| if i % 2 == 0 { Turn::human(m) } else { Turn::assistant(m) })
            .collect();
        Self { turns }
    }

    /// The turns in chronological order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if the conversation has no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render the conversation as newline-joined, role-prefixed lines.
    pub fn to_transcript(&self) -> String {
        self.turns.iter().map(Turn::to_string).collect::<Vec<_>>().join("\n")
    }
}

impl From<Vec<Turn>> for Conversation {
    fn from(turns: Vec<Turn>) -> Self {
        Self::new(turns)
    }
}

/// A chat history in one of the accepted input shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatHistory {
    /// An already formatted transcript.
    Transcript(String),
    /// Deprecated flat string list alternating human and assistant turns.
    LegacyPairwise(Vec<String>),
    /// A list of turns.
    TurnList(Conversation),
}

impl ChatHistory {
    /// Detect the shape of a JSON history value.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if the value is neither a string,
    /// a list of strings (optionally nested one level), nor a list of turns.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(ChatHistory::Transcript(s.clone())),
            Value::Array(items) => match items.first() {
                None => Ok(ChatHistory::TurnList(Conversation::default())),
                Some(Value::String(_)) | Some(Value::Array(_)) => {
                    let mut flat = Vec::new();
                    for item in items {
                        flatten_legacy(item, &mut flat)?;
                    }
                    Ok(ChatHistory::LegacyPairwise(flat))
                }
                Some(_) => {
                    let turns: Vec<Turn> = serde_json::from_value(value.clone()).map_err(|e| {
                        RagError::InvalidInput(format!("chat history is not a list of turns: {e}"))
                    })?;
                    Ok(ChatHistory::TurnList(Conversation::new(turns)))
                }
            },
            other => Err(RagError::InvalidInput(format!(
                "unsupported chat history shape: {}",
                value_kind(other)
            ))),
        }
    }

    /// Convert the history into a transcript string.
    ///
    /// Using the legacy pairwise form emits a deprecation warning.
    pub fn into_transcript(self) -> String {
        match self {
            ChatHistory::Transcript(s) => s,
            ChatHistory::LegacyPairwise(messages) => {
                warn!(
                    message_count = messages.len(),
                    "flat string chat history is deprecated; pass a list of turns instead"
                );
                Conversation::from_legacy_pairwise(messages).to_transcript()
            }
            ChatHistory::TurnList(conversation) => conversation.to_transcript(),
        }
    }
}

impl From<Conversation> for ChatHistory {
    fn from(conversation: Conversation) -> Self {
        ChatHistory::TurnList(conversation)
    }
}

impl From<Vec<Turn>> for ChatHistory {
    fn from(turns: Vec<Turn>) -> Self {
        ChatHistory::TurnList(Conversation::new(turns))
    }
}

fn flatten_legacy(value: &Value, out: &mut Vec<String>) -> Result<()> {
    match value {
        Value::String(s) => {
            out.push(s.clone());
            Ok(())
        }
        Value::Array(inner) => {
            for v in inner {
                match v {
                    Value::String(s) => out.push(s.clone()),
                    other => {
                        return Err(RagError::InvalidInput(format!(
                            "legacy chat history entries must be strings, found {}",
                            value_kind(other)
                        )));
                    }
                }
            }
            Ok(())
        }
        other => Err(RagError::InvalidInput(format!(
            "legacy chat history entries must be strings, found {}",
            value_kind(other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
