//! The orchestration loop at the heart of Botty.
//!
//! One user turn runs as a series of model rounds:
//!
//! 1. **Build the request** (system prompt with memories, history, tool specs)
//! 2. **Call the model** via the configured provider
//! 3. **Walk the response in order**: text goes to history and display,
//!    each tool call runs (or replays from the cache) and its outcome is
//!    appended to history
//! 4. **If the response held tool calls**, loop back to step 1
//!
//! Progress is reported as a lazy stream of [`TurnSnapshot`]s so a
//! front-end can redraw as soon as anything changes.

pub mod cache;
pub mod display;
pub mod loop_runner;
pub mod prompt;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use cache::{CachedOutcome, ToolResultCache, cache_key};
pub use display::{DisplayTurn, ToolCallDisplay, ToolCallStatus, TurnSnapshot};
pub use loop_runner::{APOLOGY, AgentLoop};
pub use session::Session;
