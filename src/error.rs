//! Error types and result aliases for the tooloop library.
//!
//! This module defines the core error type [`TooloopError`] and the [`Result`] type alias
//! used throughout the library. Fatal conditions of a send or a tool loop surface as one of
//! these variants; a failing tool implementation does not, it is folded into the
//! conversation as tool-result text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TooloopError {
    #[error("LLM gateway error: {0}")]
    GatewayError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("No implementation found for tool: {0}")]
    ToolNotFound(String),

    #[error("Model not supported: {0}")]
    ModelNotSupported(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Stream ended without a final message")]
    IncompleteStream,

    #[error("Cannot continue conversation: {0}")]
    ContinuationError(String),

    #[error("Trace callback failed: {0}")]
    TraceError(String),

    #[error("Tool use not answered: {}", .0.join(", "))]
    UnansweredToolUse(Vec<String>),
}

pub type Result<T> = std::result::Result<T, TooloopError>;
