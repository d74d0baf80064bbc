//! Commonly used types, importable in one line.

pub use crate::agent::{App, TurnStream};
pub use crate::agent_loop::{LoopRunner, Phase, RunInput};
pub use crate::config::CmdsageConfig;
pub use crate::error::{CmdsageError, Result};
pub use crate::gateway::{GeminiGateway, ModelGateway, ModelReply, ToolDefinition};
pub use crate::session::{FileSessionStore, MemorySessionStore, SessionId, SessionStore};
pub use crate::tools::{AgentTool, Tool, ToolParameters, ToolRegistry};
pub use crate::types::{FinalResponse, Role, ToolCallRequest, ToolResult, Turn, TurnBody};
