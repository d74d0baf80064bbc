//! Name-to-tool registry and the execute contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::tool::Tool;
use super::validation::validate_arguments;
use crate::error::{CmdsageError, Result};
use crate::types::{ToolCallRequest, ToolResult};

/// Static mapping from tool name to implementation.
///
/// Adding a tool is a data change (one `register` call), not a control-flow
/// change.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its declared name. Replaces any previous tool
    /// with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All registered tools, in name order (stable catalog order).
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one tool call request.
    ///
    /// Argument validation failures and tool failures are absorbed into a
    /// [`ToolResult`] carrying an `error` field; they never abort the turn
    /// loop. Only an unknown tool name escalates, as
    /// [`CmdsageError::UnknownTool`].
    pub async fn execute(&self, request: &ToolCallRequest) -> Result<ToolResult> {
        let tool = self
            .lookup(&request.tool_name)
            .ok_or_else(|| CmdsageError::UnknownTool(request.tool_name.clone()))?;

        if let Err(message) = validate_arguments(&request.arguments, &tool.parameters().schema) {
            warn!(tool = %request.tool_name, %message, "rejecting tool call arguments");
            return Ok(ToolResult::err(
                &request.call_id,
                format!("invalid arguments: {message}"),
            ));
        }

        debug!(tool = %request.tool_name, call_id = %request.call_id, "executing tool");
        let args = ToolArguments::new(request.arguments.clone());
        match tool.execute(&args).await {
            Ok(output) => Ok(ToolResult::ok(&request.call_id, output)),
            Err(e) => {
                warn!(tool = %request.tool_name, error = %e, "tool execution failed");
                Ok(ToolResult::err(&request.call_id, e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
