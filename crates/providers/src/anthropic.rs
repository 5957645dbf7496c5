//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field, optionally marked for prompt caching
//! - Native tool use with inline `tool_use` / `tool_result` content blocks

use async_trait::async_trait;
use botty_core::provider::{ContentItem, ModelRequest, ModelResponse, ModelTurn, Usage};
use botty_core::{ConversationTurn, ProviderError, Role, ToolInvocation, ToolSpec, TurnContent};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    /// Mark the system prompt with `cache_control: ephemeral`.
    prompt_caching: bool,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: crate::http_client(Duration::from_secs(300))?,
            prompt_caching: false,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_prompt_caching(mut self, enabled: bool) -> Self {
        self.prompt_caching = enabled;
        self
    }

    /// Convert the history to Anthropic messages.
    ///
    /// Tool results travel as `user` content. Consecutive turns that map to
    /// the same role are merged into one message, since the API expects
    /// strictly alternating roles.
    fn to_api_messages(history: &[ConversationTurn]) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for turn in history {
            let role = match turn.role {
                Role::Assistant => "assistant",
                Role::User | Role::ToolResult => "user",
            };

            let block = match &turn.content {
                TurnContent::Text { text } if text.trim().is_empty() => continue,
                TurnContent::Text { text } => ContentBlock::Text { text: text.clone() },
                TurnContent::ToolUse { invocation } => ContentBlock::ToolUse {
                    id: invocation.id.clone(),
                    name: invocation.name.clone(),
                    input: invocation.input.clone(),
                },
                TurnContent::ToolResult { outcome } => ContentBlock::ToolResult {
                    tool_use_id: outcome.tool_use_id.clone(),
                    content: outcome.content.clone(),
                    is_error: outcome.is_error,
                },
            };

            match result.last_mut() {
                Some(last) if last.role == role => last.content.push(block),
                _ => result.push(AnthropicMessage {
                    role: role.into(),
                    content: vec![block],
                }),
            }
        }

        result
    }

    /// Convert tool specs to Anthropic format.
    fn to_api_tools(tools: &[ToolSpec]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    /// Build the JSON request body.
    fn request_body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.history),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if !request.system.is_empty() {
            body["system"] = if self.prompt_caching {
                serde_json::json!([{
                    "type": "text",
                    "text": request.system,
                    "cache_control": {"type": "ephemeral"}
                }])
            } else {
                serde_json::json!(request.system)
            };
        }

        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Convert an Anthropic API response to a `ModelResponse`.
    fn to_model_response(resp: AnthropicResponse) -> ModelResponse {
        let items = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(ContentItem::Text { text }),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    Some(ContentItem::ToolUse(ToolInvocation { id, name, input }))
                }
                ResponseContentBlock::Other => None,
            })
            .collect();

        let usage = Some(Usage {
            prompt_tokens: resp.usage.input_tokens,
            completion_tokens: resp.usage.output_tokens,
            total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
        });

        ModelResponse {
            turn: ModelTurn::new(items),
            usage,
            model: resp.model,
            stop_reason: resp.stop_reason,
        }
    }
}

#[async_trait]
impl botty_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(&request);

        debug!(
            provider = "anthropic",
            model = %request.model,
            turns = request.history.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(crate::transport_error)?;

        let response = crate::check_status("Anthropic", response).await?;

        let api_resp: AnthropicResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        Ok(Self::to_model_response(api_resp))
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec![
            "claude-3-5-sonnet-20241022".into(),
            "claude-3-5-haiku-20241022".into(),
            "claude-3-opus-20240229".into(),
        ])
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Thinking and any block type we do not act on
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
