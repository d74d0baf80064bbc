//! Turn types: the immutable records that make up a conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Agent,
    ToolResult,
}

/// A tool invocation requested by the model.
///
/// `call_id` is unique within its wave and correlates the request with the
/// [`ToolResult`] produced for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// The outcome of executing one [`ToolCallRequest`]: exactly one of
/// `output` (success) or `error` (failure description) is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            output: Some(output),
            error: None,
        }
    }

    pub fn err(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Body of a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnBody {
    Text { text: String },
    ToolCalls { calls: Vec<ToolCallRequest> },
    ToolResult { result: ToolResult },
}

/// One immutable record in a conversation's ordered history.
///
/// Created by the state machine on each model or tool response; never
/// mutated afterward. `sequence_number` is monotonic within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub body: TurnBody,
    pub sequence_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    /// Create a system turn.
    pub fn system(sequence_number: u64, text: impl Into<String>) -> Self {
        Self::text_turn(Role::System, sequence_number, text)
    }

    /// Create a user turn.
    pub fn user(sequence_number: u64, text: impl Into<String>) -> Self {
        Self::text_turn(Role::User, sequence_number, text)
    }

    /// Create an agent turn carrying free text.
    pub fn agent_text(sequence_number: u64, text: impl Into<String>) -> Self {
        Self::text_turn(Role::Agent, sequence_number, text)
    }

    /// Create an agent turn carrying a wave of tool calls.
    ///
    /// The batch must be non-empty; an empty batch is not a wave, it is the
    /// "no more tools" signal and never becomes a turn.
    pub fn agent_tool_calls(sequence_number: u64, calls: Vec<ToolCallRequest>) -> Self {
        debug_assert!(!calls.is_empty(), "a tool-call turn carries at least one call");
        Self {
            role: Role::Agent,
            body: TurnBody::ToolCalls { calls },
            sequence_number,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a tool-result turn.
    pub fn tool_result(sequence_number: u64, result: ToolResult) -> Self {
        Self {
            role: Role::ToolResult,
            body: TurnBody::ToolResult { result },
            sequence_number,
            timestamp: Some(Utc::now()),
        }
    }

    fn text_turn(role: Role, sequence_number: u64, text: impl Into<String>) -> Self {
        Self {
            role,
            body: TurnBody::Text { text: text.into() },
            sequence_number,
            timestamp: Some(Utc::now()),
        }
    }

    /// The text content, when this turn carries text.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            TurnBody::Text { text } => Some(text),
            _ => None,
        }
    }

    /// The tool calls carried by this turn (empty for non-wave turns).
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match &self.body {
            TurnBody::ToolCalls { calls } => calls,
            _ => &[],
        }
    }

    /// The tool result carried by this turn, if any.
    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match &self.body {
            TurnBody::ToolResult { result } => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructors_set_role_and_sequence() {
        let t = Turn::user(3, "hello");
        assert_eq!(t.role, Role::User);
        assert_eq!(t.sequence_number, 3);
        assert_eq!(t.text(), Some("hello"));
    }

    #[test]
    fn tool_calls_accessor_is_empty_for_text_turns() {
        let t = Turn::agent_text(0, "done");
        assert!(t.tool_calls().is_empty());
        assert!(t.as_tool_result().is_none());
    }

    #[test]
    fn tool_result_roundtrips_through_json() {
        let turn = Turn::tool_result(5, ToolResult::ok("call-1", json!({"installed": true})));
        let encoded = serde_json::to_string(&turn).unwrap();
        let decoded: Turn = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, turn);
    }

    #[test]
    fn tool_result_error_is_tagged() {
        let r = ToolResult::err("call-2", "timed out");
        assert!(r.is_error());
        assert!(r.output.is_none());
        let encoded = serde_json::to_value(&r).unwrap();
        assert!(encoded.get("output").is_none());
        assert_eq!(encoded["error"], "timed out");
    }
}
