//! The agent orchestration loop implementation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use botty_config::{AppConfig, ConfigError};
use botty_core::event::{DomainEvent, EventBus};
use botty_core::{
    ContentItem, ConversationTurn, Error, ModelRequest, ModelTurn, Provider, ToolContext,
    ToolError, ToolOutcome, ToolRegistry,
};
use chrono::Utc;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::cache::{CachedOutcome, cache_key};
use crate::display::{DisplayTurn, ToolCallDisplay, TurnSnapshot};
use crate::prompt;
use crate::session::Session;

/// Shown to the user when the model call fails.
pub const APOLOGY: &str =
    "Sorry, I ran into a problem while working on that. Please try again in a moment.";

/// The core loop that interleaves model calls with tool execution.
///
/// An `AgentLoop` holds only shared, immutable collaborators; all
/// conversation state lives in the [`Session`] passed to each turn.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tools offered to the model, in registration order
    tools: Arc<ToolRegistry>,

    /// The model to use
    model: String,

    /// Base system prompt; memories are appended per call
    system_prompt: String,

    max_tokens: u32,
    temperature: f32,
    top_p: Option<f32>,
    frequency_penalty: Option<f32>,
    presence_penalty: Option<f32>,

    /// Maximum model rounds per turn
    max_rounds: u32,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop with default settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            system_prompt: prompt::DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            max_rounds: 25,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Create an agent loop from the application configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self, ConfigError> {
        let mut agent = Self::new(provider, tools, &config.default_model)
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
            .with_sampling(config.top_p, config.frequency_penalty, config.presence_penalty)
            .with_max_rounds(config.agent.max_rounds);
        if let Some(system_prompt) = config.system_prompt()? {
            agent = agent.with_system_prompt(system_prompt);
        }
        Ok(agent)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the optional sampling parameters.
    pub fn with_sampling(
        mut self,
        top_p: Option<f32>,
        frequency_penalty: Option<f32>,
        presence_penalty: Option<f32>,
    ) -> Self {
        self.top_p = top_p;
        self.frequency_penalty = frequency_penalty;
        self.presence_penalty = presence_penalty;
        self
    }

    /// Set the maximum number of model rounds per turn.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max;
        self
    }

    /// Publish domain events on a shared bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    fn build_request(&self, session: &Session) -> ModelRequest {
        ModelRequest {
            model: self.model.clone(),
            system: prompt::system_prompt(&self.system_prompt, &session.memory),
            history: session.history.turns().to_vec(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            tools: self.tools.specs(),
        }
    }

    fn fail_turn(&self, session: &Session, err: &Error) {
        error!(session_id = %session.id, error = %err, "Turn failed");
        self.event_bus.publish(DomainEvent::TurnFailed {
            session_id: session.id.to_string(),
            error_message: err.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Run one user turn.
    ///
    /// Returns a lazy stream of snapshots. Model text and every tool status
    /// update produce a snapshot as soon as they happen. The last snapshot
    /// has `finished` set. Failures are reported in the snapshots, never as
    /// a stream error. Dropping the stream abandons the turn; whatever was
    /// already appended to the history stays there.
    pub fn run_turn<'a>(
        &'a self,
        session: &'a mut Session,
        user_message: impl Into<String>,
    ) -> BoxStream<'a, TurnSnapshot> {
        let user_message = user_message.into();

        stream! {
            let mut turns: Vec<DisplayTurn> = Vec::new();
            let mut memory = session.memory.render_markdown();

            info!(
                session_id = %session.id,
                history = session.history.len(),
                "Processing user message"
            );
            session.history.push(ConversationTurn::user(user_message));

            let mut round: u32 = 0;
            loop {
                round += 1;
                if round > self.max_rounds {
                    self.fail_turn(session, &Error::MaxRoundsExceeded(self.max_rounds));
                    turns.push(DisplayTurn::Error {
                        message: format!(
                            "I stopped after {} rounds of tool calls without reaching an answer. \
                             Please try rephrasing your request.",
                            self.max_rounds
                        ),
                    });
                    yield snapshot(&turns, None, &memory, true);
                    return;
                }

                let request = self.build_request(session);
                debug!(
                    session_id = %session.id,
                    round,
                    turns = request.history.len(),
                    estimated_tokens = session.history.estimated_tokens(),
                    "Calling model"
                );

                let response = match self.provider.complete(request).await {
                    Ok(response) => response,
                    Err(e) => {
                        self.fail_turn(session, &Error::Provider(e));
                        turns.push(DisplayTurn::Error { message: APOLOGY.into() });
                        yield snapshot(&turns, None, &memory, true);
                        return;
                    }
                };

                let tool_uses = response.turn.tool_uses().count();
                self.event_bus.publish(DomainEvent::ModelResponded {
                    session_id: session.id.to_string(),
                    model: response.model.clone(),
                    round,
                    tool_uses,
                    tokens_used: response.usage.map(|u| u.total_tokens),
                    timestamp: Utc::now(),
                });

                if let Err(e) = check_unique_ids(&response.turn) {
                    self.fail_turn(session, &e);
                    turns.push(DisplayTurn::Error { message: APOLOGY.into() });
                    yield snapshot(&turns, None, &memory, true);
                    return;
                }

                for item in response.turn.items {
                    let invocation = match item {
                        ContentItem::Text { text } => {
                            if text.trim().is_empty() {
                                continue;
                            }
                            session.history.push(ConversationTurn::assistant(text.clone()));
                            turns.push(DisplayTurn::Assistant { text });
                            yield snapshot(&turns, None, &memory, false);
                            continue;
                        }
                        ContentItem::ToolUse(invocation) => invocation,
                    };

                    let started = Instant::now();
                    let mut call = ToolCallDisplay::pending(&invocation);
                    yield snapshot(&turns, Some(&call), &memory, false);

                    let key = cache_key(&invocation.name, &invocation.input);
                    let cacheable = self
                        .tools
                        .get(&invocation.name)
                        .is_some_and(|tool| tool.cacheable());
                    let hit = if cacheable {
                        session.cache.get(&key).cloned()
                    } else {
                        None
                    };
                    let cached = hit.is_some();

                    let outcome: Result<CachedOutcome, ToolError> = match hit {
                        Some(hit) => {
                            debug!(tool = %invocation.name, "Replaying cached tool outcome");
                            for update in &hit.updates {
                                call.apply(update);
                                yield snapshot(&turns, Some(&call), &memory, false);
                            }
                            Ok(hit)
                        }
                        None => {
                            debug!(tool = %invocation.name, input = %invocation.input, "Calling tool");
                            let ctx = ToolContext {
                                session_id: &session.id,
                                memory: &mut session.memory,
                            };
                            let mut updates = Vec::new();
                            let mut finished = None;
                            let mut tool_stream = self.tools.execute(ctx, &invocation);
                            while let Some(item) = tool_stream.next().await {
                                match item {
                                    Ok(update) => {
                                        call.apply(&update);
                                        let result = update.result.clone();
                                        updates.push(update);
                                        yield snapshot(&turns, Some(&call), &memory, false);
                                        if let Some(result) = result {
                                            finished = Some(Ok(result));
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        finished = Some(Err(e));
                                        break;
                                    }
                                }
                            }
                            drop(tool_stream);

                            match finished {
                                Some(Ok(result)) => Ok(CachedOutcome { updates, result }),
                                Some(Err(e)) => Err(e),
                                None => Err(ToolError::MissingResult(invocation.name.clone())),
                            }
                        }
                    };

                    session.history.push(ConversationTurn::tool_use(invocation.clone()));
                    let success = outcome.is_ok();
                    match outcome {
                        Ok(done) => {
                            call.mark_done(cached);
                            session.history.push(ConversationTurn::tool_result(
                                ToolOutcome::success(&invocation.id, &done.result),
                            ));
                            if cacheable && !cached {
                                session.cache.put(key, done);
                            }
                        }
                        Err(e) => {
                            warn!(
                                session_id = %session.id,
                                tool = %invocation.name,
                                error = %e,
                                "Tool call failed"
                            );
                            call.mark_failed(&e);
                            session.history.push(ConversationTurn::tool_result(
                                ToolOutcome::error(&invocation.id, e.to_string()),
                            ));
                        }
                    }

                    let duration_ms = started.elapsed().as_millis() as u64;
                    info!(
                        session_id = %session.id,
                        tool = %invocation.name,
                        success,
                        cached,
                        duration_ms,
                        "Tool call finished"
                    );
                    self.event_bus.publish(DomainEvent::ToolExecuted {
                        session_id: session.id.to_string(),
                        tool_name: invocation.name.clone(),
                        success,
                        cached,
                        duration_ms,
                        timestamp: Utc::now(),
                    });

                    memory = session.memory.render_markdown();
                    turns.push(DisplayTurn::ToolCall(call));
                    yield snapshot(&turns, None, &memory, false);
                }

                if tool_uses == 0 {
                    info!(session_id = %session.id, rounds = round, "Turn complete");
                    yield snapshot(&turns, None, &memory, true);
                    return;
                }
            }
        }
        .boxed()
    }

    /// Run one user turn to completion and return its final snapshot.
    pub async fn run_to_end(
        &self,
        session: &mut Session,
        user_message: impl Into<String>,
    ) -> TurnSnapshot {
        let mut updates = self.run_turn(session, user_message);
        let mut last = None;
        while let Some(snapshot) = updates.next().await {
            last = Some(snapshot);
        }
        drop(updates);

        last.unwrap_or_else(|| TurnSnapshot {
            turns: Vec::new(),
            memory: session.memory.render_markdown(),
            finished: true,
        })
    }
}

/// Build a snapshot from the finished display turns plus the call in flight.
fn snapshot(
    turns: &[DisplayTurn],
    active: Option<&ToolCallDisplay>,
    memory: &str,
    finished: bool,
) -> TurnSnapshot {
    let mut all = turns.to_vec();
    all.extend(active.cloned().map(DisplayTurn::ToolCall));
    TurnSnapshot {
        turns: all,
        memory: memory.to_string(),
        finished,
    }
}

/// Tool-use ids must be unique within one model response.
fn check_unique_ids(turn: &ModelTurn) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for invocation in turn.tool_uses() {
        if !seen.insert(invocation.id.as_str()) {
            return Err(Error::DuplicateToolUseId(invocation.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ToolCallStatus;
    use crate::test_helpers::*;
    use botty_core::{History, ProviderError, Role, TurnContent};
    use serde_json::json;

    fn agent(provider: Arc<ScriptedProvider>, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(provider, Arc::new(tools), "mock-model").with_system_prompt("You are Botty.")
    }

    fn outcomes(session: &Session) -> Vec<ToolOutcome> {
        session
            .history
            .turns()
            .iter()
            .filter_map(|t| match &t.content {
                TurnContent::ToolResult { outcome } => Some(outcome.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn text_only_response_ends_after_one_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("Hello! How can I help?")]));
        let agent = agent(provider.clone(), ToolRegistry::new());
        let mut session = Session::default();

        let snapshots: Vec<_> = agent.run_turn(&mut session, "Hello!").collect().await;

        assert_eq!(provider.call_count(), 1);
        let last = snapshots.last().unwrap();
        assert!(last.finished);
        assert_eq!(last.assistant_text(), "Hello! How can I help?");
        assert!(snapshots[..snapshots.len() - 1].iter().all(|s| !s.finished));

        // User + assistant text
        let turns = session.history.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].text(), Some("Hello! How can I help?"));
    }

    #[tokio::test]
    async fn request_carries_prompt_tools_and_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("ok")]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CountingTool::new("lookup")));
        let agent = agent(provider.clone(), tools)
            .with_max_tokens(256)
            .with_sampling(Some(0.9), None, Some(0.1));
        let mut session = Session::default();
        session.memory.save("likes coffee", None);

        agent.run_to_end(&mut session, "hi").await;

        let request = &provider.requests()[0];
        assert_eq!(request.model, "mock-model");
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.top_p, Some(0.9));
        assert_eq!(request.presence_penalty, Some(0.1));
        assert!(request.system.starts_with("You are Botty."));
        assert!(request.system.ends_with("remember:\n0: likes coffee"));
        assert_eq!(request.tools[0].name, "lookup");
        assert_eq!(request.history.len(), 1);
    }

    #[tokio::test]
    async fn tool_round_trip_appends_matched_pair() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "lookup", json!({"q": "porto"}))]),
            text_response("Porto is in Portugal."),
        ]));
        let mut tools = ToolRegistry::new();
        let tool = CountingTool::new("lookup");
        let calls = tool.calls();
        tools.register(Box::new(tool));
        let agent = agent(provider.clone(), tools);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "Where is Porto?").await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(last.turns.len(), 2);
        let call = last.turns[0].as_tool_call().unwrap();
        assert_eq!(call.status, ToolCallStatus::Done);
        assert_eq!(call.title, "🛠️ Used tool `lookup`");
        assert_eq!(call.body(), "✅ looked up");

        // user, tool_use, tool_result, assistant
        let roles: Vec<_> = session.history.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::ToolResult, Role::Assistant]);
        assert_eq!(outcomes(&session)[0].tool_use_id, "call_1");
        assert_eq!(outcomes(&session)[0].content, r#"{"q":"porto"}"#);

        // The second request sees the tool result
        assert_eq!(provider.requests()[1].history.len(), 3);
    }

    #[tokio::test]
    async fn statuses_are_surfaced_progressively() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "lookup", json!({}))]),
            text_response("done"),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CountingTool::new("lookup")));
        let agent = agent(provider, tools);
        let mut session = Session::default();

        let snapshots: Vec<_> = agent.run_turn(&mut session, "go").collect().await;
        let bodies: Vec<String> = snapshots
            .iter()
            .filter_map(|s| s.turns.last().and_then(DisplayTurn::as_tool_call))
            .map(|c| c.body())
            .collect();

        assert_eq!(bodies[0], "Processing...");
        assert!(bodies.contains(&"⏳ looking up".to_string()));
        assert_eq!(bodies.last().unwrap(), "✅ looked up");
    }

    #[tokio::test]
    async fn failed_tool_is_recorded_and_loop_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "broken", json!({}))]),
            text_response("Sorry, the lookup failed."),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(FailingTool));
        let agent = agent(provider.clone(), tools);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "try it").await;

        assert!(last.finished);
        assert_eq!(provider.call_count(), 2);
        let call = last.turns[0].as_tool_call().unwrap();
        assert_eq!(call.status, ToolCallStatus::Failed);
        assert!(call.body().contains("upstream exploded"));

        let outcome = &outcomes(&session)[0];
        assert!(outcome.is_error);
        assert!(outcome.content.contains("upstream exploded"));
        assert!(session.cache.is_empty());

        // The model saw the failure on the next round
        let second = &provider.requests()[1];
        assert!(second.history.iter().any(|t| matches!(
            &t.content,
            TurnContent::ToolResult { outcome } if outcome.is_error
        )));
    }

    #[tokio::test]
    async fn unknown_tool_and_invalid_input_fail_only_the_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![
                tool_use("call_1", "teleport", json!({})),
                tool_use("call_2", "lookup", json!("not an object")),
            ]),
            text_response("Let me try something else."),
        ]));
        let mut tools = ToolRegistry::new();
        let tool = CountingTool::new("lookup");
        let calls = tool.calls();
        tools.register(Box::new(tool));
        let agent = agent(provider, tools);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "go").await;

        assert!(last.finished);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        let outcomes = outcomes(&session);
        assert!(outcomes.iter().all(|o| o.is_error));
        assert!(outcomes[0].content.contains("Tool not found: teleport"));
        assert!(outcomes[1].content.contains("Invalid tool arguments"));
    }

    #[tokio::test]
    async fn tool_without_result_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "silent", json!({}))]),
            text_response("hm"),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(SilentTool));
        let agent = agent(provider, tools);
        let mut session = Session::default();

        agent.run_to_end(&mut session, "go").await;

        let outcome = &outcomes(&session)[0];
        assert!(outcome.is_error);
        assert!(outcome.content.contains("without producing a result"));
    }

    #[tokio::test]
    async fn identical_calls_execute_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "lookup", json!({"a": 1, "b": {"c": 2, "d": 3}}))]),
            tool_response(vec![tool_use("call_2", "lookup", json!({"b": {"d": 3, "c": 2}, "a": 1}))]),
            text_response("done"),
        ]));
        let mut tools = ToolRegistry::new();
        let tool = CountingTool::new("lookup");
        let calls = tool.calls();
        tools.register(Box::new(tool));
        let agent = agent(provider, tools);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "twice").await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(session.cache.len(), 1);

        let first = last.turns[0].as_tool_call().unwrap();
        let second = last.turns[1].as_tool_call().unwrap();
        assert_eq!(first.body(), second.body());
        assert!(!first.cached);
        assert!(second.cached);

        let outcomes = outcomes(&session);
        assert_eq!(outcomes[0].content, outcomes[1].content);
        assert_eq!(outcomes[1].tool_use_id, "call_2");
    }

    #[tokio::test]
    async fn cache_is_per_session() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "lookup", json!({"a": 1}))]),
            text_response("one"),
            tool_response(vec![tool_use("call_1", "lookup", json!({"a": 1}))]),
            text_response("two"),
        ]));
        let mut tools = ToolRegistry::new();
        let tool = CountingTool::new("lookup");
        let calls = tool.calls();
        tools.register(Box::new(tool));
        let agent = agent(provider, tools);

        let mut first = Session::default();
        let mut second = Session::default();
        agent.run_to_end(&mut first, "go").await;
        agent.run_to_end(&mut second, "go").await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn interleaved_items_keep_model_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            response(vec![
                ContentItem::Text { text: "First".into() },
                tool_use("call_1", "lookup", json!({"n": 1})),
                ContentItem::Text { text: "Then".into() },
                tool_use("call_2", "lookup", json!({"n": 2})),
            ]),
            text_response("Finally"),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CountingTool::new("lookup")));
        let agent = agent(provider, tools);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "go").await;

        let kinds: Vec<&str> = session
            .history
            .turns()
            .iter()
            .map(|t| match &t.content {
                TurnContent::Text { .. } => "text",
                TurnContent::ToolUse { .. } => "tool_use",
                TurnContent::ToolResult { .. } => "tool_result",
            })
            .collect();
        assert_eq!(
            kinds,
            [
                "text", "text", "tool_use", "tool_result", "text", "tool_use", "tool_result",
                "text"
            ]
        );
        assert_eq!(last.turns.len(), 5);
        assert!(matches!(&last.turns[0], DisplayTurn::Assistant { text } if text == "First"));
    }

    #[tokio::test]
    async fn max_rounds_ends_turn_with_error() {
        let provider = Arc::new(ScriptedProvider::repeating(tool_response(vec![tool_use(
            "call_1",
            "lookup",
            json!({}),
        )])));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CountingTool::new("lookup")));
        let agent = agent(provider.clone(), tools).with_max_rounds(3);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "loop forever").await;

        assert!(last.finished);
        assert_eq!(provider.call_count(), 3);
        assert!(matches!(last.turns.last(), Some(DisplayTurn::Error { message }) if message.contains("3 rounds")));
    }

    #[tokio::test]
    async fn duplicate_tool_ids_abort_the_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![tool_response(vec![
            tool_use("call_1", "lookup", json!({"n": 1})),
            tool_use("call_1", "lookup", json!({"n": 2})),
        ])]));
        let mut tools = ToolRegistry::new();
        let tool = CountingTool::new("lookup");
        let calls = tool.calls();
        tools.register(Box::new(tool));
        let agent = agent(provider, tools);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "go").await;

        assert!(last.finished);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(matches!(last.turns.as_slice(), [DisplayTurn::Error { .. }]));
        assert_eq!(session.history.len(), 1);
    }

    #[tokio::test]
    async fn model_error_becomes_apology() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![Err(ProviderError::Network(
            "connection reset".into(),
        ))]));
        let agent = agent(provider, ToolRegistry::new());
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "hello?").await;

        assert!(last.finished);
        assert_eq!(last.turns, vec![DisplayTurn::Error { message: APOLOGY.into() }]);
        // The user message stays in history
        assert_eq!(session.history.len(), 1);
    }

    #[tokio::test]
    async fn events_are_published() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "lookup", json!({}))]),
            text_response("done"),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CountingTool::new("lookup")));
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let agent = agent(provider, tools).with_event_bus(bus);
        let mut session = Session::default();

        agent.run_to_end(&mut session, "go").await;

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event.as_ref() {
                DomainEvent::ModelResponded { round, .. } => format!("model:{round}"),
                DomainEvent::ToolExecuted { tool_name, cached, .. } => format!("tool:{tool_name}:{cached}"),
                DomainEvent::TurnFailed { .. } => "failed".into(),
            });
        }
        assert_eq!(names, ["model:1", "tool:lookup:false", "model:2"]);
    }

    #[tokio::test]
    async fn remembers_what_the_user_asked() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use(
                "toolu_1",
                "save_memory",
                json!({"memory_data": "likes coffee"}),
            )]),
            text_response("Got it!"),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(botty_tools::memory::SaveMemoryTool));
        let agent = agent(provider.clone(), tools);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "Remember that I like coffee").await;

        assert_eq!(last.memory, "0. likes coffee");
        assert_eq!(last.turns.len(), 2);
        let call = last.turns[0].as_tool_call().unwrap();
        assert_eq!(call.status, ToolCallStatus::Done);
        assert_eq!(call.body(), "✅ Added new memory: `likes coffee`.");
        assert!(matches!(&last.turns[1], DisplayTurn::Assistant { text } if text == "Got it!"));

        // The memory reaches the system prompt of the next call
        assert!(provider.requests()[1].system.ends_with("remember:\n0: likes coffee"));
    }

    #[tokio::test]
    async fn memory_tools_always_run() {
        let save = || tool_use("toolu_1", "save_memory", json!({"memory_data": "likes tea"}));
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![save()]),
            tool_response(vec![save()]),
            text_response("Saved twice."),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(botty_tools::memory::SaveMemoryTool));
        let agent = agent(provider, tools);
        let mut session = Session::default();

        let last = agent.run_to_end(&mut session, "Remember tea, really").await;

        assert_eq!(session.memory.len(), 2);
        assert!(session.cache.is_empty());
        assert_eq!(last.memory, "0. likes tea\n1. likes tea");
    }

    #[tokio::test]
    async fn rewritten_history_is_sent_on_next_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "lookup", json!({"q": "porto"}))]),
            text_response("Porto is in Portugal."),
            text_response("Lisbon is the capital."),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CountingTool::new("lookup")));
        let agent = agent(provider.clone(), tools);
        let mut session = Session::default();

        agent.run_to_end(&mut session, "Where is Porto?").await;
        assert_eq!(session.history.len(), 4);

        // Drop the tool_use/tool_result pair between turns
        let kept: Vec<_> = session
            .history
            .turns()
            .iter()
            .filter(|t| matches!(t.content, TurnContent::Text { .. }))
            .cloned()
            .collect();
        let kept_ids: Vec<String> = kept.iter().map(|t| t.id.clone()).collect();
        session.history = History::from_turns(kept);

        let last = agent.run_to_end(&mut session, "And the capital?").await;

        assert!(last.finished);
        assert_eq!(last.assistant_text(), "Lisbon is the capital.");
        let request = &provider.requests()[2];
        let sent: Vec<_> = request.history.iter().map(|t| t.id.clone()).collect();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[..2], kept_ids[..]);
        assert_eq!(request.history[2].text(), Some("And the capital?"));

        // The new turn is appended after the rewritten prefix
        let turns = session.history.turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].id, kept_ids[0]);
        assert_eq!(turns[1].id, kept_ids[1]);
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(turns[3].text(), Some("Lisbon is the capital."));
    }

    #[tokio::test]
    async fn tools_run_with_the_session_id() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_response(vec![tool_use("call_1", "whoami", json!({}))]),
            text_response("done"),
        ]));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(WhoAmITool));
        let agent = agent(provider, tools);
        let mut session = Session::default();

        agent.run_to_end(&mut session, "who am I?").await;

        assert_eq!(outcomes(&session)[0].content, session.id.to_string());
    }

    #[test]
    fn unique_ids_check() {
        let ok = ModelTurn::new(vec![
            tool_use("a", "lookup", json!({})),
            tool_use("b", "lookup", json!({})),
        ]);
        assert!(check_unique_ids(&ok).is_ok());

        let dup = ModelTurn::new(vec![
            tool_use("a", "lookup", json!({})),
            tool_use("a", "lookup", json!({})),
        ]);
        assert!(matches!(check_unique_ids(&dup), Err(Error::DuplicateToolUseId(id)) if id == "a"));
    }

    #[test]
    fn from_config_uses_configured_prompt() {
        let mut config = AppConfig::default();
        config.agent.system_prompt = Some("Custom prompt".into());
        config.agent.max_rounds = 7;
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = AgentLoop::from_config(&config, provider, Arc::new(ToolRegistry::new())).unwrap();
        assert_eq!(agent.system_prompt, "Custom prompt");
        assert_eq!(agent.max_rounds, 7);
        assert_eq!(agent.model, config.default_model);
    }
}
