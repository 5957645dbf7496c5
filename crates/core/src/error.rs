//! Error types for the Botty domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only [`Error`] is turn-fatal.

use thiserror::Error;

/// Turn-fatal errors: the loop reports these to the user and ends the turn.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider reused tool call id '{0}' within one response")]
    DuplicateToolUseId(String),

    #[error("Exceeded the maximum of {0} model rounds in one turn")]
    MaxRoundsExceeded(u32),
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Memory index {index} is out of range (have {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed in {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Upstream service error in {tool_name}: {reason}")]
    Upstream { tool_name: String, reason: String },

    #[error("Tool {0} finished without producing a result")]
    MissingResult(String),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
