//! Model gateway: adapts conversation history into backend requests.

pub mod gemini;
pub mod http;

pub use gemini::GeminiGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{FinalResponse, ToolCallRequest, Turn};

/// Tool definition advertised to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// What the backend elected to do with the conversation so far.
///
/// Modeled as an explicit tagged variant rather than duck-typed inspection
/// of the response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// One wave of tool calls, executed before the next gateway call.
    ToolCallBatch(Vec<ToolCallRequest>),
    /// Free text; in the turn loop this only signals "no more tools needed".
    Answer(String),
    /// The fixed-schema answer produced in structured mode.
    StructuredAnswer(FinalResponse),
}

/// Adapter between the turn history and the generation backend.
///
/// With `structured` set, the reply is constrained to the
/// [`FinalResponse`] schema. Transport failures, non-success statuses, and
/// non-conforming structured payloads all surface as
/// [`CmdsageError::BackendUnavailable`](crate::error::CmdsageError::BackendUnavailable);
/// the gateway never retries on its own.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn converse(
        &self,
        history: &[Turn],
        catalog: &[ToolDefinition],
        structured: bool,
    ) -> Result<ModelReply>;
}
