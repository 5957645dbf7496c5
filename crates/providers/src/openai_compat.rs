//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Groq, DeepSeek and any
//! endpoint exposing `/chat/completions`.
//!
//! Tool requests arrive as a separate `tool_calls` list whose arguments are
//! a JSON-encoded string; they are decoded into ordinary tool-use items
//! placed after the message text.

use async_trait::async_trait;
use botty_core::provider::{ContentItem, ModelRequest, ModelResponse, ModelTurn, Usage};
use botty_core::{ConversationTurn, ProviderError, ToolInvocation, ToolSpec, TurnContent};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: crate::http_client(Duration::from_secs(120))?,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert the system prompt and history to OpenAI chat messages.
    ///
    /// Assistant text and the tool calls that follow it share one message.
    /// Each tool outcome becomes its own `tool` message.
    fn to_api_messages(system: &str, history: &[ConversationTurn]) -> Vec<ApiMessage> {
        let mut result = Vec::new();

        if !system.is_empty() {
            result.push(ApiMessage::text("system", system));
        }

        for turn in history {
            match &turn.content {
                TurnContent::Text { text } if turn.role == botty_core::Role::User => {
                    result.push(ApiMessage::text("user", text));
                }
                TurnContent::Text { text } => match open_assistant(&mut result) {
                    Some(last) => {
                        let content = last.content.get_or_insert_with(String::new);
                        if !content.is_empty() {
                            content.push('\n');
                        }
                        content.push_str(text);
                    }
                    None => result.push(ApiMessage::text("assistant", text)),
                },
                TurnContent::ToolUse { invocation } => {
                    let call = ApiToolCall {
                        id: invocation.id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: invocation.name.clone(),
                            arguments: invocation.input.to_string(),
                        },
                    };
                    match open_assistant(&mut result) {
                        Some(last) => last.tool_calls.get_or_insert_with(Vec::new).push(call),
                        None => result.push(ApiMessage {
                            role: "assistant".into(),
                            content: None,
                            tool_calls: Some(vec![call]),
                            tool_call_id: None,
                        }),
                    }
                }
                TurnContent::ToolResult { outcome } => {
                    let content = if outcome.is_error {
                        format!("Error: {}", outcome.content)
                    } else {
                        outcome.content.clone()
                    };
                    result.push(ApiMessage {
                        role: "tool".into(),
                        content: Some(content),
                        tool_calls: None,
                        tool_call_id: Some(outcome.tool_use_id.clone()),
                    });
                }
            }
        }

        result
    }

    /// Convert tool specs to OpenAI API format.
    fn to_api_tools(tools: &[ToolSpec]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect()
    }

    /// Build the JSON request body.
    fn request_body(request: &ModelRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.system, &request.history),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(penalty) = request.frequency_penalty {
            body["frequency_penalty"] = serde_json::json!(penalty);
        }
        if let Some(penalty) = request.presence_penalty {
            body["presence_penalty"] = serde_json::json!(penalty);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Convert an API response to a `ModelResponse`.
    fn to_model_response(api_response: ApiResponse) -> Result<ModelResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let mut items = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            items.push(ContentItem::Text { text });
        }

        for tc in choice.message.tool_calls.unwrap_or_default() {
            let input = if tc.function.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&tc.function.arguments).map_err(|e| {
                    ProviderError::MalformedResponse(format!(
                        "Arguments for tool call {} are not valid JSON: {e}",
                        tc.id
                    ))
                })?
            };
            items.push(ContentItem::ToolUse(ToolInvocation {
                id: tc.id,
                name: tc.function.name,
                input,
            }));
        }

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ModelResponse {
            turn: ModelTurn::new(items),
            usage,
            model: api_response.model,
            stop_reason: choice.finish_reason,
        })
    }
}

/// The last message, if it is an assistant message still open for merging.
fn open_assistant(messages: &mut [ApiMessage]) -> Option<&mut ApiMessage> {
    messages.last_mut().filter(|m| m.role == "assistant")
}

#[async_trait]
impl botty_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            turns = request.history.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(crate::transport_error)?;

        let response = crate::check_status(&self.name, response).await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        Self::to_model_response(api_response)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(crate::transport_error)?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let models = body["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
