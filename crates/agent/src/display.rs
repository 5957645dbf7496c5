//! What a chat front-end shows while a turn runs.
//!
//! A turn yields a sequence of [`TurnSnapshot`]s. Each snapshot carries the
//! display turns produced so far in this turn plus the memory panel text;
//! front-ends render the latest one and keep their own scrollback.

use botty_core::{StatusKind, ToolError, ToolInvocation, ToolUpdate};
use serde::{Deserialize, Serialize};

/// Body shown for a tool call before its first status update.
pub const PENDING_BODY: &str = "Processing...";

/// Lifecycle of a tool call as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Done,
    Failed,
}

/// A tool call panel: a title plus the accumulated status lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDisplay {
    pub tool_use_id: String,
    pub tool_name: String,
    pub title: String,
    pub status: ToolCallStatus,
    /// Whether the outcome was replayed from the tool result cache
    pub cached: bool,
    lines: Vec<(StatusKind, String)>,
}

impl ToolCallDisplay {
    pub fn pending(invocation: &ToolInvocation) -> Self {
        Self {
            tool_use_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            title: format!("🛠️ Using tool `{}`", invocation.name),
            status: ToolCallStatus::Pending,
            cached: false,
            lines: Vec::new(),
        }
    }

    /// Fold a status update into the panel.
    ///
    /// A `current` line replaces the previous line when that line was also
    /// `current`; a `step` line is always appended.
    pub fn apply(&mut self, update: &ToolUpdate) {
        self.push_line(update.kind, update.status.clone());
    }

    fn push_line(&mut self, kind: StatusKind, text: String) {
        if kind == StatusKind::Current {
            if let Some((StatusKind::Current, last)) = self.lines.last_mut() {
                *last = text;
                return;
            }
        }
        self.lines.push((kind, text));
    }

    pub fn mark_done(&mut self, cached: bool) {
        self.status = ToolCallStatus::Done;
        self.cached = cached;
        self.title = format!("🛠️ Used tool `{}`", self.tool_name);
    }

    pub fn mark_failed(&mut self, error: &ToolError) {
        self.status = ToolCallStatus::Failed;
        self.title = format!("⚠️ Tool `{}` failed", self.tool_name);
        self.push_line(StatusKind::Current, format!("❌ {error}"));
    }

    /// Status lines joined for display.
    pub fn body(&self) -> String {
        if self.lines.is_empty() {
            return PENDING_BODY.to_string();
        }
        self.lines
            .iter()
            .map(|(_, line)| line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One item of the chat transcript shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayTurn {
    /// Text written by the model
    Assistant { text: String },
    /// A tool the model called
    ToolCall(ToolCallDisplay),
    /// The turn could not complete
    Error { message: String },
}

impl DisplayTurn {
    pub fn as_tool_call(&self) -> Option<&ToolCallDisplay> {
        match self {
            DisplayTurn::ToolCall(call) => Some(call),
            _ => None,
        }
    }
}

/// One element of the update sequence produced by a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Display turns produced so far in this turn, in order
    pub turns: Vec<DisplayTurn>,
    /// Memory panel markdown (`"i. value"` lines)
    pub memory: String,
    /// Set on the last snapshot of the turn
    pub finished: bool,
}

impl TurnSnapshot {
    /// The assistant text of this turn, paragraphs joined by blank lines.
    pub fn assistant_text(&self) -> String {
        self.turns
            .iter()
            .filter_map(|t| match t {
                DisplayTurn::Assistant { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
