//! Assembly of streamed Messages API events into a final [`Response`].
//!
//! The server sends `message_start`, then for every content block a
//! `content_block_start`, any number of `content_block_delta`s and a
//! `content_block_stop`, then `message_delta` (stop reason, output usage) and
//! finally `message_stop`. `ping` events may appear anywhere.

use crate::error::{Result, TooloopError};
use crate::llm::gateway::StreamEvent;
use crate::llm::models::{ContentBlock, Response, StopReason};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireEvent {
    MessageStart {
        message: Response,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: WireDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: WireMessageDelta,
        #[serde(default)]
        usage: Option<WireDeltaUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: WireError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMessageDelta {
    #[serde(default)]
    stop_reason: Option<StopReason>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDeltaUsage {
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireError {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// Builds the final message out of stream events.
#[derive(Debug, Default)]
pub(crate) struct MessageAssembler {
    message: Option<Response>,
    partial_inputs: HashMap<usize, String>,
}

impl MessageAssembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Parse one SSE `data:` payload and apply it
    pub(crate) fn apply_data(&mut self, data: &str) -> Result<Option<StreamEvent>> {
        let event: WireEvent = serde_json::from_str(data)?;
        self.apply(event)
    }

    /// Apply one event, returning what should be surfaced to the caller, if anything
    pub(crate) fn apply(&mut self, event: WireEvent) -> Result<Option<StreamEvent>> {
        match event {
            WireEvent::MessageStart { message } => {
                self.message = Some(message);
                self.partial_inputs.clear();
                Ok(None)
            }
            WireEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                let message = self.message_mut()?;
                if index != message.content.len() {
                    warn!(index, blocks = message.content.len(), "Out of order content block");
                }
                message.content.push(content_block);
                Ok(None)
            }
            WireEvent::ContentBlockDelta { index, delta } => match delta {
                WireDelta::TextDelta { text } => {
                    match self.message_mut()?.content.get_mut(index) {
                        Some(ContentBlock::Text { text: existing }) => existing.push_str(&text),
                        _ => {
                            return Err(TooloopError::GatewayError(format!(
                                "Text delta for non-text block {}",
                                index
                            )))
                        }
                    }
                    Ok(Some(StreamEvent::TextDelta { index, text }))
                }
                WireDelta::InputJsonDelta { partial_json } => {
                    self.partial_inputs.entry(index).or_default().push_str(&partial_json);
                    Ok(Some(StreamEvent::InputJsonDelta {
                        index,
                        partial_json,
                    }))
                }
                WireDelta::Other => Ok(None),
            },
            WireEvent::ContentBlockStop { index } => {
                let partial = self.partial_inputs.remove(&index);
                if let Some(ContentBlock::ToolUse { input, .. }) =
                    self.message_mut()?.content.get_mut(index)
                {
                    if let Some(json) = partial {
                        *input = parse_tool_input(&json)?;
                    }
                }
                Ok(None)
            }
            WireEvent::MessageDelta { delta, usage } => {
                let message = self.message_mut()?;
                if delta.stop_reason.is_some() {
                    message.stop_reason = delta.stop_reason;
                }
                if let Some(usage) = usage {
                    let totals = &mut message.usage;
                    if let Some(n) = usage.output_tokens {
                        totals.output_tokens = n;
                    }
                    if let Some(n) = usage.input_tokens {
                        totals.input_tokens = n;
                    }
                    if let Some(n) = usage.cache_creation_input_tokens {
                        totals.cache_creation_input_tokens = n;
                    }
                    if let Some(n) = usage.cache_read_input_tokens {
                        totals.cache_read_input_tokens = n;
                    }
                }
                Ok(None)
            }
            WireEvent::MessageStop => {
                let message = self.message.take().ok_or_else(|| {
                    TooloopError::GatewayError("message_stop before message_start".to_string())
                })?;
                Ok(Some(StreamEvent::Message(Box::new(message))))
            }
            WireEvent::Ping | WireEvent::Unknown => Ok(None),
            WireEvent::Error { error } => Err(TooloopError::ApiError(format!(
                "{}: {}",
                error.error_type, error.message
            ))),
        }
    }

    fn message_mut(&mut self) -> Result<&mut Response> {
        self.message.as_mut().ok_or_else(|| {
            TooloopError::GatewayError("Stream event before message_start".to_string())
        })
    }
}

fn parse_tool_input(json: &str) -> Result<Value> {
    if json.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::Role;
    use serde_json::json;

    const START: &str = r#"{"type":"message_start","message":{"id":"msg_1","type":"message","role":"assistant","model":"claude-3-5-sonnet-20241022","content":[],"stop_reason":null,"usage":{"input_tokens":25,"output_tokens":1,"cache_read_input_tokens":4}}}"#;

    fn feed(assembler: &mut MessageAssembler, lines: &[&str]) -> Vec<StreamEvent> {
        lines.iter().filter_map(|line| assembler.apply_data(line).unwrap()).collect()
    }

    #[test]
    fn test_assembles_text_message() {
        let mut assembler = MessageAssembler::new();
        let events = feed(
            &mut assembler,
            &[
                START,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"ping"}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" there"}}"#,
                r#"{"type":"content_block_stop","index":0}"#,
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn","stop_sequence":null},"usage":{"output_tokens":15}}"#,
                r#"{"type":"message_stop"}"#,
            ],
        );

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            StreamEvent::TextDelta {
                index: 0,
                text: "Hello".to_string()
            }
        );

        let StreamEvent::Message(message) = &events[2] else {
            panic!("Expected final message");
        };
        assert_eq!(message.id, "msg_1");
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Hello there");
        assert_eq!(message.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(message.usage.input_tokens, 25);
        assert_eq!(message.usage.output_tokens, 15);
        assert_eq!(message.usage.cache_read_input_tokens, 4);
    }

    #[test]
    fn test_assembles_tool_use_input() {
        let mut assembler = MessageAssembler::new();
        let events = feed(
            &mut assembler,
            &[
                START,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_weather","input":{}}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"city\": "}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"\"Paris\"}"}}"#,
                r#"{"type":"content_block_stop","index":0}"#,
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_2","name":"get_time","input":{}}}"#,
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":""}}"#,
                r#"{"type":"content_block_stop","index":1}"#,
                r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":40}}"#,
                r#"{"type":"message_stop"}"#,
            ],
        );

        let Some(StreamEvent::Message(message)) = events.last() else {
            panic!("Expected final message");
        };
        let uses = message.tool_uses();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].input, &json!({"city": "Paris"}));
        assert_eq!(uses[1].id, "toolu_2");
        assert_eq!(uses[1].input, &json!({}));
        assert_eq!(message.stop_reason, Some(StopReason::ToolUse));
    }

    #[test]
    fn test_unknown_block_type_is_skipped() {
        let mut assembler = MessageAssembler::new();
        let events = feed(
            &mut assembler,
            &[
                START,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"Hmm"}}"#,
                r#"{"type":"content_block_stop","index":0}"#,
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"Answer"}}"#,
                r#"{"type":"content_block_stop","index":1}"#,
                r#"{"type":"message_stop"}"#,
            ],
        );

        let Some(StreamEvent::Message(message)) = events.last() else {
            panic!("Expected final message");
        };
        assert_eq!(message.content[0], ContentBlock::Unsupported);
        assert_eq!(message.text(), "Answer");
        assert_eq!(message.to_message().content, vec![ContentBlock::text("Answer")]);
    }

    #[test]
    fn test_error_event() {
        let mut assembler = MessageAssembler::new();
        let result = assembler
            .apply_data(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#);

        match result {
            Err(TooloopError::ApiError(message)) => {
                assert_eq!(message, "overloaded_error: Overloaded")
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_delta_before_start() {
        let mut assembler = MessageAssembler::new();
        let result = assembler.apply_data(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"x"}}"#,
        );
        assert!(matches!(result, Err(TooloopError::GatewayError(_))));
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let mut assembler = MessageAssembler::new();
        assert!(assembler.apply_data(r#"{"type":"something_new","x":1}"#).unwrap().is_none());
    }

    #[test]
    fn test_malformed_tool_input() {
        let mut assembler = MessageAssembler::new();
        feed(
            &mut assembler,
            &[
                START,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"t","name":"n","input":{}}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"a\":"}}"#,
            ],
        );
        let result = assembler.apply_data(r#"{"type":"content_block_stop","index":0}"#);
        assert!(matches!(result, Err(TooloopError::SerializationError(_))));
    }
}
