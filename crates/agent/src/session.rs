//! Per-conversation state.
//!
//! Each conversation owns its history, memory store and tool result cache.
//! Nothing here is shared between sessions; one turn runs at a time because
//! `AgentLoop::run_turn` borrows the session mutably.

use botty_core::memory::DEFAULT_MAX_ENTRIES;
use botty_core::{History, MemoryStore, SessionId};

use crate::cache::ToolResultCache;

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Provider-agnostic transcript, replayed on every model call.
    /// Front-ends may rewrite it between turns.
    pub history: History,
    pub memory: MemoryStore,
    pub cache: ToolResultCache,
}

impl Session {
    /// A fresh session whose memory keeps at most `max_memory_entries` facts.
    pub fn new(max_memory_entries: usize) -> Self {
        Self {
            id: SessionId::new(),
            history: History::new(),
            memory: MemoryStore::new(max_memory_entries),
            cache: ToolResultCache::new(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
