use crate::error::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Definition of a tool as advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Build a definition whose input schema is derived from `T`
    pub fn for_input<T: JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let mut schema = serde_json::to_value(schemars::schema_for!(T))?;
        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
            object.remove("title");
        }
        Ok(Self::new(name, description, schema))
    }
}

/// Trait for locally executable tools
///
/// `run` receives the structured input of a tool-use request and returns the text
/// sent back to the model. An `Err` does not end a tool loop; it becomes an
/// `"Error: ..."` tool result instead.
#[async_trait]
pub trait LlmTool: Send + Sync {
    /// Execute the tool with the given input
    async fn run(&self, input: &Value) -> Result<String>;

    /// Definition advertised to the model, if the tool describes itself
    fn definition(&self) -> Option<ToolDefinition> {
        None
    }

    /// Check if this tool matches the given name
    fn matches(&self, name: &str) -> bool {
        self.definition().is_some_and(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_serialization() {
        let definition = ToolDefinition::new(
            "get_weather",
            "Get the weather for a city",
            json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        );

        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value["name"], "get_weather");
        assert_eq!(value["description"], "Get the weather for a city");
        assert_eq!(value["input_schema"]["required"], json!(["city"]));
    }

    #[test]
    fn test_tool_definition_for_input() {
        #[derive(JsonSchema)]
        #[allow(dead_code)]
        struct WeatherInput {
            /// City to look up
            city: String,
            days: Option<u8>,
        }

        let definition =
            ToolDefinition::for_input::<WeatherInput>("get_weather", "Weather lookup").unwrap();

        assert_eq!(definition.name, "get_weather");
        assert_eq!(definition.input_schema["type"], "object");
        assert!(definition.input_schema["properties"]["city"].is_object());
        assert!(definition.input_schema.get("$schema").is_none());
        assert_eq!(definition.input_schema["required"], json!(["city"]));
    }

    struct MockTool;

    #[async_trait]
    impl LlmTool for MockTool {
        async fn run(&self, input: &Value) -> Result<String> {
            Ok(format!("got {}", input["value"]))
        }

        fn definition(&self) -> Option<ToolDefinition> {
            Some(ToolDefinition::new("mock_tool", "A mock tool", json!({"type": "object"})))
        }
    }

    struct Anonymous;

    #[async_trait]
    impl LlmTool for Anonymous {
        async fn run(&self, _input: &Value) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_tool_matches() {
        assert!(MockTool.matches("mock_tool"));
        assert!(!MockTool.matches("other_tool"));
        assert!(!Anonymous.matches("mock_tool"));
    }

    #[tokio::test]
    async fn test_tool_run() {
        let result = MockTool.run(&json!({"value": 3})).await.unwrap();
        assert_eq!(result, "got 3");
    }
}
