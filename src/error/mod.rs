//! Error types for cmdsage.

use thiserror::Error;

/// Primary error type for all cmdsage operations.
#[derive(Error, Debug)]
pub enum CmdsageError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport or protocol failure talking to the model backend.
    ///
    /// Aborts the current loop iteration; the session stays resumable from
    /// its last durable turn. Retry policy belongs to the caller.
    #[error("model backend unavailable: {message}")]
    BackendUnavailable { message: String },

    /// A tool failed while executing. Captured per call and converted into a
    /// `tool_result` turn; never fatal to the loop.
    #[error("tool execution failed: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    /// The model requested a tool that is not in the registry. Indicates a
    /// catalog/registry mismatch and escalates to the caller.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A second, different final response was recorded for a session.
    #[error("session {session_id} already finalized with a different response")]
    AlreadyFinalized { session_id: String },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CmdsageError {
    /// Create a [`CmdsageError::BackendUnavailable`].
    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Create a [`CmdsageError::ToolExecution`].
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CmdsageError>;
