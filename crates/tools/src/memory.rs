//! Memory tools: let the model save and discard facts about the user.
//!
//! These are the only writers of the session's memory store. Their effect
//! depends on the store's current contents, so they are never cached.

use async_stream::try_stream;
use botty_core::memory::SaveOutcome;
use botty_core::tool::{Tool, ToolContext, ToolStream, ToolUpdate};
use futures::StreamExt;
use serde::Deserialize;

use crate::parse_input;

pub struct SaveMemoryTool;

#[derive(Debug, Deserialize)]
struct SaveMemoryInput {
    memory_data: String,
    #[serde(default)]
    index: Option<usize>,
}

impl Tool for SaveMemoryTool {
    fn name(&self) -> &str {
        "save_memory"
    }

    fn description(&self) -> &str {
        "Used to store information the user requested to remember. Can optionally specify index \
         to overwrite existing memories. Memorized information will be used in system prompt."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "memory_data": {
                    "type": "string",
                    "description": "Summarized version of the information to remember, compressed to use the least tokens possible while preserving all relevant facts"
                },
                "index": {
                    "type": "integer",
                    "description": "Optional index where to store the memory. If provided, overwrites existing memory at that index. If not provided, appends to end of memory list.",
                    "minimum": 0
                }
            },
            "required": ["memory_data"]
        })
    }

    fn cacheable(&self) -> bool {
        false
    }

    fn execute<'a>(&'a self, ctx: ToolContext<'a>, input: serde_json::Value) -> ToolStream<'a> {
        let ToolContext { session_id, memory } = ctx;
        try_stream! {
            let input: SaveMemoryInput = parse_input(input)?;
            let status = match memory.save(input.memory_data.clone(), input.index) {
                SaveOutcome::Updated { index } => {
                    format!("✅ Updated memory `{index}`: `{}`.", input.memory_data)
                }
                SaveOutcome::Appended { retained } => {
                    if !retained {
                        tracing::debug!(
                            %session_id,
                            max = memory.max_entries(),
                            "Memory full, new entry dropped"
                        );
                    }
                    format!("✅ Added new memory: `{}`.", input.memory_data)
                }
            };
            yield ToolUpdate::done(status, serde_json::Value::Null);
        }
        .boxed()
    }
}

pub struct DeleteMemoryTool;

#[derive(Debug, Deserialize)]
struct DeleteMemoryInput {
    memory_index: usize,
}

impl Tool for DeleteMemoryTool {
    fn name(&self) -> &str {
        "delete_memory"
    }

    fn description(&self) -> &str {
        "Used to discard information that was previously stored in memory."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "memory_index": {
                    "type": "integer",
                    "description": "The index of the memory slot to discard. The system prompt enumerates all memories at all times, prefixed by their memory slot, this is what should be referenced.",
                    "minimum": 0
                }
            },
            "required": ["memory_index"]
        })
    }

    fn cacheable(&self) -> bool {
        false
    }

    fn execute<'a>(&'a self, ctx: ToolContext<'a>, input: serde_json::Value) -> ToolStream<'a> {
        let ToolContext { session_id, memory } = ctx;
        try_stream! {
            let input: DeleteMemoryInput = parse_input(input)?;
            let removed = memory.delete(input.memory_index)?;
            tracing::debug!(%session_id, index = input.memory_index, remaining = memory.len(), "Memory deleted");
            yield ToolUpdate::done(format!("✅ Deleted memory: `{removed}`."), serde_json::Value::Null);
        }
        .boxed()
    }
}
