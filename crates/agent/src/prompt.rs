//! System prompt assembly.

use botty_core::MemoryStore;

/// Built-in system prompt, used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../prompts/system.txt");

/// The system prompt for one model call: the base prompt followed by the
/// current memory listing, re-enumerated from slot 0.
pub fn system_prompt(base: &str, memory: &MemoryStore) -> String {
    let base = base.trim();
    let listing = memory.render_for_prompt();
    if listing.is_empty() {
        return base.to_string();
    }
    format!("{base}\n\nHere are the memories the user asked you to remember:\n{listing}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_memory_leaves_prompt_alone() {
        let memory = MemoryStore::default();
        assert_eq!(system_prompt("You are Botty.\n", &memory), "You are Botty.");
    }

    #[test]
    fn memories_are_listed_after_the_prompt() {
        let mut memory = MemoryStore::default();
        memory.save("likes coffee", None);
        memory.save("lives in Porto", None);
        memory.delete(0).unwrap();
        memory.save("has a dog", None);
        assert_eq!(
            system_prompt("You are Botty.", &memory),
            "You are Botty.\n\nHere are the memories the user asked you to remember:\n0: lives in Porto\n1: has a dog"
        );
    }

    #[test]
    fn default_prompt_mentions_memory_tools() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("save_memory"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("delete_memory"));
    }
}
