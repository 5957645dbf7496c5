//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send the history to an LLM and return one model
//! turn. Whatever the wire convention (inline `tool_use` content blocks or a
//! separate `tool_calls` list), the response is normalized into a
//! [`ModelTurn`]: an ordered list of text and tool-use items.
//!
//! Implementations: Anthropic Messages API, OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::ConversationTurn;
use crate::tool::{ToolInvocation, ToolSpec};

/// Everything a model call needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g., "claude-3-5-sonnet-20241022", "gpt-4o")
    pub model: String,

    /// Full system prompt, memory listing included
    pub system: String,

    /// The conversation so far
    pub history: Vec<ConversationTurn>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

/// One item of a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    ToolUse(ToolInvocation),
}

/// A provider-agnostic model turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTurn {
    pub items: Vec<ContentItem>,
}

impl ModelTurn {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    /// A turn with a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentItem::Text { text: text.into() }])
    }

    pub fn text_segments(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            ContentItem::Text { text } => Some(text.as_str()),
            ContentItem::ToolUse(_) => None,
        })
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.items.iter().filter_map(|item| match item {
            ContentItem::ToolUse(invocation) => Some(invocation),
            ContentItem::Text { .. } => None,
        })
    }

    pub fn has_tool_use(&self) -> bool {
        self.tool_uses().next().is_some()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The normalized turn
    pub turn: ModelTurn,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Why the model stopped, if the provider says
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// The core Provider trait.
///
/// The orchestration loop calls `complete()` without knowing which backend
/// is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;

    /// List available models for this provider.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_turn_splits_items_in_order() {
        let turn = ModelTurn::new(vec![
            ContentItem::Text { text: "Let me check".into() },
            ContentItem::ToolUse(ToolInvocation {
                id: "toolu_1".into(),
                name: "geocode".into(),
                input: serde_json::json!({"address": "Porto"}),
            }),
            ContentItem::Text { text: "and also".into() },
        ]);
        assert_eq!(turn.text_segments().collect::<Vec<_>>(), ["Let me check", "and also"]);
        assert_eq!(turn.tool_uses().count(), 1);
        assert!(turn.has_tool_use());
    }

    #[test]
    fn text_turn_has_no_tool_use() {
        assert!(!ModelTurn::text("Got it!").has_tool_use());
    }

    #[test]
    fn content_item_serialization() {
        let item = ContentItem::Text { text: "hi".into() };
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"kind":"text","text":"hi"}"#);
    }
}
