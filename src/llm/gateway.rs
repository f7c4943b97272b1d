use crate::error::Result;
use crate::llm::models::{Message, Response};
use crate::llm::tools::ToolDefinition;
use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// How the model may pick tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    Any,
    Tool { name: String },
    None,
}

/// Per-call options for a send
///
/// Unset fields fall back to the conversation's defaults.
#[derive(Debug, Clone, Default)]
pub struct CompletionConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tool_choice: Option<ToolChoice>,
    pub stream: bool,
}

impl CompletionConfig {
    /// Options for a streaming call
    pub fn streaming() -> Self {
        Self {
            stream: true,
            ..Default::default()
        }
    }
}

/// Request body for the message-creation endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    pub stream: bool,
}

/// Incremental event of a streaming call
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of text for the content block at `index`
    TextDelta { index: usize, text: String },
    /// A fragment of the JSON input of the tool-use block at `index`
    InputJsonDelta { index: usize, partial_json: String },
    /// The fully assembled message, emitted once the stream completes
    Message(Box<Response>),
}

/// Abstract interface for the hosted message endpoint
#[async_trait]
pub trait MessagesGateway: Send + Sync {
    /// Create a message and return it whole
    async fn create_message(&self, request: &MessageRequest) -> Result<Response>;

    /// Create a message as a stream of events ending with [`StreamEvent::Message`]
    fn stream_message<'a>(
        &'a self,
        request: &'a MessageRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_config_default() {
        let config = CompletionConfig::default();

        assert_eq!(config.temperature, None);
        assert_eq!(config.max_tokens, None);
        assert_eq!(config.tool_choice, None);
        assert!(!config.stream);
    }

    #[test]
    fn test_completion_config_streaming() {
        let config = CompletionConfig::streaming();
        assert!(config.stream);
        assert_eq!(config.temperature, None);
    }

    #[test]
    fn test_tool_choice_serialization() {
        assert_eq!(serde_json::to_value(ToolChoice::Auto).unwrap(), json!({"type": "auto"}));
        assert_eq!(serde_json::to_value(ToolChoice::Any).unwrap(), json!({"type": "any"}));
        assert_eq!(
            serde_json::to_value(ToolChoice::Tool {
                name: "lookup".to_string()
            })
            .unwrap(),
            json!({"type": "tool", "name": "lookup"})
        );
    }

    #[test]
    fn test_message_request_serialization() {
        let request = MessageRequest {
            model: "claude-3-5-haiku-20241022".to_string(),
            messages: vec![Message::user("Hi")],
            system: None,
            temperature: 0.0,
            max_tokens: 4096,
            tools: None,
            tool_choice: None,
            stream: false,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "claude-3-5-haiku-20241022");
        assert_eq!(value["max_tokens"], 4096);
        assert_eq!(value["stream"], false);
        assert!(value.get("system").is_none());
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
        assert_eq!(value["messages"][0]["content"][0]["text"], "Hi");
    }

    #[test]
    fn test_message_request_with_tools() {
        let request = MessageRequest {
            model: "m".to_string(),
            messages: vec![],
            system: Some("Be brief".to_string()),
            temperature: 0.5,
            max_tokens: 10,
            tools: Some(vec![ToolDefinition::new("lookup", "Look up", json!({"type": "object"}))]),
            tool_choice: Some(ToolChoice::Any),
            stream: true,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["system"], "Be brief");
        assert_eq!(value["tools"][0]["name"], "lookup");
        assert_eq!(value["tool_choice"], json!({"type": "any"}));
    }
}
