//! Shared test helpers: a scripted gateway and stub tools.
#![allow(dead_code)] // each test binary uses a subset of these helpers

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cmdsage::error::{CmdsageError, Result};
use cmdsage::gateway::{ModelGateway, ModelReply, ToolDefinition};
use cmdsage::tools::{AgentTool, Tool, ToolParameters};
use cmdsage::types::{FinalResponse, ToolCallRequest, Turn};

/// One recorded gateway invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub history: Vec<Turn>,
    pub catalog_names: Vec<String>,
    pub structured: bool,
}

/// Gateway that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, reply: ModelReply) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub fn queue_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(CmdsageError::backend(message)));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn converse(
        &self,
        history: &[Turn],
        catalog: &[ToolDefinition],
        structured: bool,
    ) -> Result<ModelReply> {
        self.calls.lock().unwrap().push(RecordedCall {
            history: history.to_vec(),
            catalog_names: catalog.iter().map(|t| t.name.clone()).collect(),
            structured,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CmdsageError::backend("scripted gateway exhausted")))
    }
}

/// A stub tool that counts its executions and returns a fixed value.
pub fn counting_tool(name: &str, counter: Arc<AtomicUsize>) -> Arc<dyn Tool> {
    let name = name.to_string();
    Arc::new(AgentTool::new(
        name.clone(),
        format!("stub for {name}"),
        ToolParameters::empty(),
        move |_args| {
            let counter = counter.clone();
            let name = name.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::json!({ "tool": name }))
            }
        },
    ))
}

/// A stub tool that always fails during execution.
pub fn failing_tool(name: &str) -> Arc<dyn Tool> {
    let name = name.to_string();
    Arc::new(AgentTool::new(
        name.clone(),
        format!("failing stub for {name}"),
        ToolParameters::empty(),
        move |_args| {
            let name = name.clone();
            async move { Err(CmdsageError::tool(name, "deliberate failure")) }
        },
    ))
}

pub fn call(id: &str, tool: &str) -> ToolCallRequest {
    ToolCallRequest {
        call_id: id.into(),
        tool_name: tool.into(),
        arguments: serde_json::json!({}),
    }
}

pub fn final_response(command: Option<&str>, confidence: f64) -> FinalResponse {
    FinalResponse {
        command: command.map(str::to_string),
        explanation: "explains the command".into(),
        confidence,
    }
}
