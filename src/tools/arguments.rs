//! Typed access to tool call arguments.

use crate::error::CmdsageError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// The raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a required string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, CmdsageError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| CmdsageError::InvalidArgument(format!("missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_str_extracts_present_key() {
        let args = ToolArguments::new(json!({"executable": "curl"}));
        assert_eq!(args.get_str("executable").unwrap(), "curl");
    }

    #[test]
    fn get_str_reports_missing_key() {
        let args = ToolArguments::new(json!({}));
        let err = args.get_str("executable").unwrap_err();
        assert!(matches!(err, CmdsageError::InvalidArgument(_)));
    }

    #[test]
    fn get_str_opt_is_none_for_wrong_type() {
        let args = ToolArguments::new(json!({"executable": 42}));
        assert!(args.get_str_opt("executable").is_none());
    }
}
