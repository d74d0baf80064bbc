//! Google Gemini gateway.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::http::shared_client;
use super::{ModelGateway, ModelReply, ToolDefinition};
use crate::error::{CmdsageError, Result};
use crate::types::{FinalResponse, Role, ToolCallRequest, Turn, TurnBody};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gateway backed by the Google Generative Language API.
pub struct GeminiGateway {
    model: String,
    api_key: String,
    base_url: String,
}

impl GeminiGateway {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (wire tests point this at a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request_body(
        &self,
        history: &[Turn],
        catalog: &[ToolDefinition],
        structured: bool,
    ) -> serde_json::Value {
        let mut system_instruction = None;
        let mut contents = Vec::new();
        // functionResponse parts carry the tool name, not our call id; map
        // ids back to names from the originating wave.
        let mut call_names: HashMap<&str, &str> = HashMap::new();

        for turn in history {
            match (&turn.role, &turn.body) {
                (Role::System, TurnBody::Text { text }) => {
                    system_instruction = Some(serde_json::json!({
                        "parts": [{"text": text}]
                    }));
                }
                (Role::User, TurnBody::Text { text }) => {
                    contents.push(serde_json::json!({
                        "role": "user",
                        "parts": [{"text": text}],
                    }));
                }
                (Role::Agent, TurnBody::Text { text }) => {
                    contents.push(serde_json::json!({
                        "role": "model",
                        "parts": [{"text": text}],
                    }));
                }
                (Role::Agent, TurnBody::ToolCalls { calls }) => {
                    for call in calls {
                        call_names.insert(&call.call_id, &call.tool_name);
                    }
                    let parts: Vec<serde_json::Value> = calls
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "functionCall": {
                                    "name": call.tool_name,
                                    "args": call.arguments,
                                }
                            })
                        })
                        .collect();
                    contents.push(serde_json::json!({ "role": "model", "parts": parts }));
                }
                (Role::ToolResult, TurnBody::ToolResult { result }) => {
                    let name = call_names
                        .get(result.call_id.as_str())
                        .copied()
                        .unwrap_or(result.call_id.as_str());
                    let response = match (&result.output, &result.error) {
                        (Some(output), _) => serde_json::json!({ "output": output }),
                        (None, Some(error)) => serde_json::json!({ "error": error }),
                        (None, None) => serde_json::json!({}),
                    };
                    contents.push(serde_json::json!({
                        "role": "function",
                        "parts": [{
                            "functionResponse": {
                                "name": name,
                                "response": response,
                            }
                        }],
                    }));
                }
                // A role/body mismatch cannot be built by the turn
                // constructors; skip rather than guess.
                _ => {}
            }
        }

        let mut body = serde_json::json!({ "contents": contents });
        let obj = body.as_object_mut().unwrap();

        if let Some(sys) = system_instruction {
            obj.insert("systemInstruction".into(), sys);
        }

        if structured {
            obj.insert(
                "generationConfig".into(),
                serde_json::json!({
                    "responseMimeType": "application/json",
                    "responseSchema": FinalResponse::schema(),
                }),
            );
        } else if !catalog.is_empty() {
            let declarations: Vec<serde_json::Value> = catalog
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect();
            obj.insert(
                "tools".into(),
                serde_json::json!([{ "functionDeclarations": declarations }]),
            );
        }

        body
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn converse(
        &self,
        history: &[Turn],
        catalog: &[ToolDefinition],
        structured: bool,
    ) -> Result<ModelReply> {
        let body = self.build_request_body(history, catalog, structured);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        debug!(model = %self.model, turns = history.len(), structured, "gateway converse");

        let resp = shared_client()
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CmdsageError::backend(format!("transport failure: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(CmdsageError::backend(format!(
                "status {status}: {body_text}"
            )));
        }

        let data: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| CmdsageError::backend(format!("malformed response body: {e}")))?;

        let candidate = data
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| CmdsageError::backend("no candidates in response"))?;

        let mut text = String::new();
        let mut calls = Vec::new();
        for part in candidate.content.parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(fc) = part.function_call {
                calls.push(ToolCallRequest {
                    call_id: Uuid::new_v4().to_string(),
                    tool_name: fc.name,
                    arguments: fc.args.unwrap_or(serde_json::Value::Object(Default::default())),
                });
            }
        }

        // Routing is structural: any requested call wins over accompanying text.
        if !calls.is_empty() {
            return Ok(ModelReply::ToolCallBatch(calls));
        }

        if structured {
            let json_text = strip_code_fences(&text);
            let response: FinalResponse = serde_json::from_str(&json_text).map_err(|e| {
                CmdsageError::backend(format!("structured reply does not match schema: {e}"))
            })?;
            response
                .conforms()
                .map_err(|msg| CmdsageError::backend(format!("structured reply invalid: {msg}")))?;
            return Ok(ModelReply::StructuredAnswer(response));
        }

        Ok(ModelReply::Answer(text))
    }
}

/// Strip markdown code fences some backends wrap JSON replies in.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_opening = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_opening
        .strip_suffix("```")
        .unwrap_or(without_opening)
        .trim()
        .to_string()
}

// Internal Gemini response types

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    args: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway() -> GeminiGateway {
        GeminiGateway::new("gemini-2.0-flash", "test-key")
    }

    #[test]
    fn strip_code_fences_handles_fenced_and_plain() {
        assert_eq!(strip_code_fences(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(
            strip_code_fences("```json\n{\"a\": 1}\n```"),
            r#"{"a": 1}"#
        );
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
    }

    #[test]
    fn request_body_maps_roles() {
        let history = vec![
            Turn::system(0, "you are helpful"),
            Turn::user(1, "is curl installed?"),
            Turn::agent_tool_calls(
                2,
                vec![ToolCallRequest {
                    call_id: "c1".into(),
                    tool_name: "is_installed".into(),
                    arguments: json!({"executable": "curl"}),
                }],
            ),
            Turn::tool_result(3, crate::types::ToolResult::ok("c1", json!({"installed": true}))),
        ];
        let body = gateway().build_request_body(&history, &[], false);

        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("helpful"));
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            contents[1]["parts"][0]["functionCall"]["name"],
            "is_installed"
        );
        // The result is reported under the tool name, recovered by call id.
        assert_eq!(contents[2]["role"], "function");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["name"],
            "is_installed"
        );
    }

    #[test]
    fn structured_mode_sets_response_schema_and_drops_tools() {
        let history = vec![Turn::user(0, "hello")];
        let catalog = vec![ToolDefinition {
            name: "is_installed".into(),
            description: "check".into(),
            parameters: json!({"type": "object"}),
        }];
        let body = gateway().build_request_body(&history, &catalog, true);
        assert!(body.get("tools").is_none());
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(body["generationConfig"]["responseSchema"].is_object());
    }

    #[test]
    fn catalog_is_advertised_as_function_declarations() {
        let history = vec![Turn::user(0, "hello")];
        let catalog = vec![ToolDefinition {
            name: "list_tables".into(),
            description: "list".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let body = gateway().build_request_body(&history, &catalog, false);
        let declarations = body["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0]["name"], "list_tables");
    }
}
