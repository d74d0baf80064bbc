//! Core data model: turns, tool calls, and the final structured answer.

pub mod response;
pub mod turn;

pub use response::FinalResponse;
pub use turn::{Role, ToolCallRequest, ToolResult, Turn, TurnBody};
