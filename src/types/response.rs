//! The terminal artifact of a session.

use serde::{Deserialize, Serialize};

/// Structured answer produced exactly once by the finalize transition.
///
/// `command` is `None` when no shell or SQL command is applicable to the
/// request; `confidence` is the model's self-estimate in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalResponse {
    pub command: Option<String>,
    pub explanation: String,
    pub confidence: f64,
}

impl FinalResponse {
    /// The fixed output schema forced onto the backend in structured mode.
    ///
    /// Expressed in the OpenAPI-style subset the Gemini `responseSchema`
    /// field accepts (`nullable` instead of union types).
    pub fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "nullable": true },
                "explanation": { "type": "string" },
                "confidence": { "type": "number" },
            },
            "required": ["explanation", "confidence"],
        })
    }

    /// Check structural conformance beyond what deserialization enforces.
    pub fn conforms(&self) -> std::result::Result<(), String> {
        if self.explanation.trim().is_empty() {
            return Err("explanation must be a non-empty string".into());
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        Ok(())
    }
}
