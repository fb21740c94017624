use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Result of a tool execution.
///
/// Immutable once built: the `with_*` methods consume the value and return a
/// new result with one field replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base64_image: Option<String>,
    /// Note for the model that is not part of the command output.
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

impl ToolResult {
    pub fn from_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn base64_image(&self) -> Option<&str> {
        self.base64_image.as_deref()
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    #[must_use]
    pub fn with_output(self, output: Option<String>) -> Self {
        Self { output, ..self }
    }

    #[must_use]
    pub fn with_error(self, error: Option<String>) -> Self {
        Self { error, ..self }
    }

    #[must_use]
    pub fn with_base64_image(self, base64_image: Option<String>) -> Self {
        Self {
            base64_image,
            ..self
        }
    }

    #[must_use]
    pub fn with_system(self, system: Option<String>) -> Self {
        Self { system, ..self }
    }
}

/// Description of a tool for the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Core tool trait. Implement for any capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in LLM function calling)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with given arguments.
    ///
    /// Failures the model can react to come back as a `ToolResult` carrying
    /// an error; `Err` is reserved for problems outside the tool's control.
    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult>;

    /// Get the full spec for LLM registration
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// Definition as sent in the provider's `tools` array.
    fn api_definition(&self) -> serde_json::Value {
        let spec = self.spec();
        json!({
            "name": spec.name,
            "description": spec.description,
            "input_schema": spec.parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
            Ok(ToolResult::from_output(args.to_string()))
        }
    }

    #[test]
    fn replace_returns_new_result() {
        let original = ToolResult::from_output("Point: 1, 2").with_error(Some("warn".into()));
        let replaced = original.clone().with_output(Some("X=1,Y=2".into()));
        assert_eq!(original.output(), Some("Point: 1, 2"));
        assert_eq!(replaced.output(), Some("X=1,Y=2"));
        assert_eq!(replaced.error(), Some("warn"));
    }

    #[test]
    fn error_helper() {
        assert!(!ToolResult::default().is_error());
        assert!(!ToolResult::from_output("ok").is_error());
        assert!(ToolResult::failure("nope").is_error());
    }

    #[test]
    fn serializes_only_present_fields() {
        let json = serde_json::to_value(ToolResult::from_output("ok")).unwrap();
        assert_eq!(json, json!({"output": "ok"}));
    }

    #[test]
    fn default_api_definition_uses_schema() {
        let def = EchoTool.api_definition();
        assert_eq!(def["name"], "echo");
        assert_eq!(def["input_schema"]["type"], "object");
    }

    #[tokio::test]
    async fn execute_through_trait_object() {
        let tool: Box<dyn Tool> = Box::new(EchoTool);
        let result = tool.execute(json!({"text": "hi"})).await.unwrap();
        assert!(result.output().unwrap().contains("hi"));
    }
}
