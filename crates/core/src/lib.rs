//! # Botty Core
//!
//! Domain types, traits, and error definitions for the Botty conversational
//! agent. This crate has **no framework dependencies**. It defines the domain
//! model that the provider, tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM provider, tool) is a trait here.
//! Implementations live in their respective crates, which keeps the
//! orchestration loop testable with scripted mocks.

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use memory::MemoryStore;
pub use message::{ConversationTurn, History, Role, SessionId, TurnContent};
pub use provider::{ContentItem, ModelRequest, ModelResponse, ModelTurn, Provider, Usage};
pub use tool::{
    StatusKind, Tool, ToolContext, ToolInvocation, ToolOutcome, ToolRegistry, ToolSpec,
    ToolStream, ToolUpdate,
};
