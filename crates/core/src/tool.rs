//! Tool trait: the abstraction over model-callable functions.
//!
//! A tool does not return a single value: it returns a lazy stream of
//! [`ToolUpdate`]s. Intermediate updates carry progress text for the user;
//! the update carrying `result` is terminal. A tool fails by yielding a
//! [`ToolError`], which the orchestration loop turns into an error outcome
//! shown to the model.

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::memory::MemoryStore;
use crate::message::SessionId;
use crate::schema;

/// How a status line combines with the ones before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Replaces the previous `current` line.
    #[default]
    Current,
    /// Appended and kept.
    Step,
}

/// One progress event emitted by a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUpdate {
    pub status: String,
    #[serde(default)]
    pub kind: StatusKind,
    /// Present only on the terminal update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ToolUpdate {
    pub fn current(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            kind: StatusKind::Current,
            result: None,
        }
    }

    pub fn step(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            kind: StatusKind::Step,
            result: None,
        }
    }

    /// Terminal update: final status line plus the result value.
    pub fn done(status: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            status: status.into(),
            kind: StatusKind::Current,
            result: Some(result),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }
}

/// The lazy update sequence a tool produces.
pub type ToolStream<'a> = BoxStream<'a, Result<ToolUpdate, ToolError>>;

/// Mutable session state handed to a tool for the duration of one call.
///
/// Tools are the only components allowed to write the memory store.
pub struct ToolContext<'a> {
    pub session_id: &'a SessionId,
    pub memory: &'a mut MemoryStore,
}

/// Static description of a tool, sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// A tool request issued by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Provider-issued id, unique within one response
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// The outcome of one invocation, as replayed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(tool_use_id: impl Into<String>, result: &serde_json::Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: render_result(result),
            is_error: false,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: description.into(),
            is_error: true,
        }
    }
}

/// Serialize a result value for transport: strings verbatim, all else as JSON.
pub fn render_result(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The core Tool trait.
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "save_memory").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn input_schema(&self) -> serde_json::Value;

    /// Whether identical calls may reuse a previous outcome.
    fn cacheable(&self) -> bool {
        true
    }

    /// Run the tool. `input` has already been validated against the schema.
    fn execute<'a>(&'a self, ctx: ToolContext<'a>, input: serde_json::Value) -> ToolStream<'a>;

    /// Convert this tool into a ToolSpec for sending to the LLM.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A single-item stream holding `err`, for failures before a tool runs.
pub fn failed<'a>(err: ToolError) -> ToolStream<'a> {
    stream::once(async move { Err(err) }).boxed()
}

/// An ordered registry of available tools.
///
/// The loop uses this to list tool specs for the model and to look up,
/// validate and run the tools the model asks for.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Keep only the named tools. An empty list keeps everything.
    pub fn retain_enabled(&mut self, enabled: &[String]) {
        if enabled.is_empty() {
            return;
        }
        self.tools.retain(|t| enabled.iter().any(|name| name == t.name()));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Specs for all registered tools, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Find the tool for `invocation` and check its input against the schema.
    pub fn resolve(&self, invocation: &ToolInvocation) -> Result<&dyn Tool, ToolError> {
        let tool = self
            .get(&invocation.name)
            .ok_or_else(|| ToolError::NotFound(invocation.name.clone()))?;
        schema::validate(&tool.input_schema(), &invocation.input)?;
        Ok(tool)
    }

    /// Resolve and run an invocation. Lookup and validation failures come
    /// back as a stream holding the error.
    pub fn execute<'a>(&'a self, ctx: ToolContext<'a>, invocation: &ToolInvocation) -> ToolStream<'a> {
        match self.resolve(invocation) {
            Ok(tool) => tool.execute(ctx, invocation.input.clone()),
            Err(e) => failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        fn execute<'a>(&'a self, _ctx: ToolContext<'a>, input: serde_json::Value) -> ToolStream<'a> {
            let text = input["text"].clone();
            stream::iter(vec![
                Ok(ToolUpdate::current("⏳ Echoing...")),
                Ok(ToolUpdate::done("✅ Echoed.", text)),
            ])
            .boxed()
        }
    }

    fn invocation(input: serde_json::Value) -> ToolInvocation {
        ToolInvocation {
            id: "call_1".into(),
            name: "echo".into(),
            input,
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.specs()[0].name, "echo");
    }

    #[test]
    fn retain_enabled_filters_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.retain_enabled(&["calculator".to_string()]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let session_id = SessionId::new();
        let mut memory = MemoryStore::default();
        let ctx = ToolContext {
            session_id: &session_id,
            memory: &mut memory,
        };

        let updates: Vec<_> = registry
            .execute(ctx, &invocation(serde_json::json!({"text": "hello world"})))
            .collect()
            .await;
        assert_eq!(updates.len(), 2);
        let last = updates[1].as_ref().unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.result, Some(serde_json::json!("hello world")));
    }

    #[tokio::test]
    async fn registry_rejects_invalid_input() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let session_id = SessionId::new();
        let mut memory = MemoryStore::default();
        let ctx = ToolContext {
            session_id: &session_id,
            memory: &mut memory,
        };

        let updates: Vec<_> = registry
            .execute(ctx, &invocation(serde_json::json!({})))
            .collect()
            .await;
        assert!(matches!(updates[0], Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn resolve_missing_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .resolve(&invocation(serde_json::json!({})))
            .err()
            .unwrap();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn outcome_rendering() {
        assert_eq!(ToolOutcome::success("a", &serde_json::json!("plain")).content, "plain");
        assert_eq!(ToolOutcome::success("a", &serde_json::Value::Null).content, "null");
        assert_eq!(
            ToolOutcome::success("a", &serde_json::json!({"lat": 1.5})).content,
            r#"{"lat":1.5}"#
        );
        assert!(ToolOutcome::error("a", "boom").is_error);
    }
}
