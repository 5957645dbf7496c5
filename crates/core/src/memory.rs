//! Memory store: a short, bounded list of facts the user asked to remember.
//!
//! The store is injected into every system prompt. Slots are addressed by
//! their current 0-based position, so indices shift after a deletion and are
//! re-enumerated on every render.

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Default number of memory slots.
pub const DEFAULT_MAX_ENTRIES: usize = 5;

/// Result of a [`MemoryStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// An existing slot was overwritten.
    Updated { index: usize },
    /// The entry was appended (it may have been truncated away if the store
    /// was already full).
    Appended { retained: bool },
}

/// Bounded, ordered list of user-persisted facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    entries: Vec<String>,
    max_entries: usize,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Save a fact.
    ///
    /// With an index inside the current bounds the slot is overwritten;
    /// otherwise the fact is appended and the list truncated to the first
    /// `max_entries` items, so a fact pushed past the bound is dropped.
    pub fn save(&mut self, data: impl Into<String>, index: Option<usize>) -> SaveOutcome {
        let data = data.into();
        match index {
            Some(index) if index < self.entries.len() => {
                self.entries[index] = data;
                SaveOutcome::Updated { index }
            }
            _ => {
                self.entries.push(data);
                let retained = self.entries.len() <= self.max_entries;
                self.entries.truncate(self.max_entries);
                SaveOutcome::Appended { retained }
            }
        }
    }

    /// Remove the slot at `index`, shifting later slots down by one.
    pub fn delete(&mut self, index: usize) -> Result<String, MemoryError> {
        if index >= self.entries.len() {
            return Err(MemoryError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// `"index: value"` lines for the system prompt.
    pub fn render_for_prompt(&self) -> String {
        self.render_with(": ")
    }

    /// `"index. value"` lines for the memory panel.
    pub fn render_markdown(&self) -> String {
        self.render_with(". ")
    }

    fn render_with(&self, separator: &str) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, value)| format!("{i}{separator}{value}"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
