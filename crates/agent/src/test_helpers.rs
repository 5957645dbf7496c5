//! Scripted provider and tools for loop tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_stream::{stream, try_stream};
use botty_core::{
    ContentItem, ModelRequest, ModelResponse, ModelTurn, Provider, ProviderError, Tool,
    ToolContext, ToolError, ToolInvocation, ToolStream, ToolUpdate,
};
use futures::StreamExt;
use serde_json::Value;

/// Replays canned responses in order and records every request.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
    /// Returned once the script runs out
    fallback: Option<ModelResponse>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(responses: Vec<Result<ModelResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `response`.
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => Ok(self
                .fallback
                .clone()
                .expect("scripted provider ran out of responses")),
        }
    }
}

pub fn response(items: Vec<ContentItem>) -> ModelResponse {
    ModelResponse {
        turn: ModelTurn::new(items),
        usage: None,
        model: "mock-model".into(),
        stop_reason: None,
    }
}

pub fn text_response(text: &str) -> ModelResponse {
    response(vec![ContentItem::Text { text: text.into() }])
}

pub fn tool_response(items: Vec<ContentItem>) -> ModelResponse {
    response(items)
}

pub fn tool_use(id: &str, name: &str, input: Value) -> ContentItem {
    ContentItem::ToolUse(ToolInvocation {
        id: id.into(),
        name: name.into(),
        input,
    })
}

/// Echoes its input back and counts how often it actually ran.
pub struct CountingTool {
    name: String,
    calls: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Looks things up"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }

    fn execute<'a>(&'a self, _ctx: ToolContext<'a>, input: Value) -> ToolStream<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        stream! {
            yield Ok::<_, ToolError>(ToolUpdate::current("⏳ looking up"));
            yield Ok(ToolUpdate::done("✅ looked up", input));
        }
        .boxed()
    }
}

/// Always fails after one status update.
pub struct FailingTool;

impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Never works"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }

    fn execute<'a>(&'a self, _ctx: ToolContext<'a>, _input: Value) -> ToolStream<'a> {
        try_stream! {
            yield ToolUpdate::current("⏳ trying");
            Err::<(), _>(ToolError::Upstream {
                tool_name: "broken".into(),
                reason: "upstream exploded".into(),
            })?;
        }
        .boxed()
    }
}

/// Ends its stream without a terminal update.
pub struct SilentTool;

impl Tool for SilentTool {
    fn name(&self) -> &str {
        "silent"
    }

    fn description(&self) -> &str {
        "Says something, returns nothing"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }

    fn execute<'a>(&'a self, _ctx: ToolContext<'a>, _input: Value) -> ToolStream<'a> {
        stream! {
            yield Ok::<_, ToolError>(ToolUpdate::current("⏳ thinking"));
        }
        .boxed()
    }
}

/// Returns the id of the session it runs in.
pub struct WhoAmITool;

impl Tool for WhoAmITool {
    fn name(&self) -> &str {
        "whoami"
    }

    fn description(&self) -> &str {
        "Names the current session"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object" })
    }

    fn cacheable(&self) -> bool {
        false
    }

    fn execute<'a>(&'a self, ctx: ToolContext<'a>, _input: Value) -> ToolStream<'a> {
        let id = ctx.session_id.to_string();
        stream! {
            yield Ok::<_, ToolError>(ToolUpdate::done("✅ identified", Value::String(id)));
        }
        .boxed()
    }
}
