//! Conversation turns and history.
//!
//! The history is the provider-agnostic transcript replayed on every model
//! call: user messages, assistant text, tool invocations and tool outcomes,
//! in the exact order they happened. Providers translate it to their wire
//! format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{ToolInvocation, ToolOutcome};

/// Unique identifier for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user
    User,
    /// The model (text or a tool request)
    Assistant,
    /// The outcome of a tool the model requested
    ToolResult,
}

/// What a turn carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    Text { text: String },
    ToolUse { invocation: ToolInvocation },
    ToolResult { outcome: ToolOutcome },
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub role: Role,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    fn new(role: Role, content: TurnContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// A message typed by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, TurnContent::Text { text: text.into() })
    }

    /// A piece of text produced by the model.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnContent::Text { text: text.into() })
    }

    /// A tool request made by the model.
    pub fn tool_use(invocation: ToolInvocation) -> Self {
        Self::new(Role::Assistant, TurnContent::ToolUse { invocation })
    }

    /// The outcome of a tool request.
    pub fn tool_result(outcome: ToolOutcome) -> Self {
        Self::new(Role::ToolResult, TurnContent::ToolResult { outcome })
    }

    /// The text of this turn, if it is a text turn.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Append-only ordered transcript of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    turns: Vec<ConversationTurn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from turns rewritten elsewhere (e.g. by a front-end).
    pub fn from_turns(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Rough token estimate (4 chars ≈ 1 token), used for logging only.
    pub fn estimated_tokens(&self) -> usize {
        self.turns
            .iter()
            .map(|t| match &t.content {
                TurnContent::Text { text } => text.len(),
                TurnContent::ToolUse { invocation } => invocation.input.to_string().len(),
                TurnContent::ToolResult { outcome } => outcome.content.len(),
            })
            .sum::<usize>()
            / 4
    }
}
