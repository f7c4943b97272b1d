use crate::error::{Result, TooloopError};
use crate::llm::tools::{LlmTool, ToolDefinition};
use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};
use std::fmt::Write;

/// Tool for getting the current date and time
///
/// Answers with a JSON object holding the formatted local time, the Unix timestamp
/// and the UTC offset. Useful when the model needs to know what day it is.
///
/// # Examples
///
/// ```ignore
/// use tooloop::llm::tools::CurrentDatetimeTool;
///
/// let chat = Chat::builder(client).tool(CurrentDatetimeTool::new()).build();
/// ```
pub struct CurrentDatetimeTool;

impl CurrentDatetimeTool {
    pub const NAME: &'static str = "get_current_datetime";

    /// Creates a new CurrentDatetimeTool instance
    pub fn new() -> Self {
        Self
    }
}

impl Default for CurrentDatetimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmTool for CurrentDatetimeTool {
    async fn run(&self, input: &Value) -> Result<String> {
        let format_string = input
            .get("format_string")
            .and_then(|v| v.as_str())
            .unwrap_or("%Y-%m-%d %H:%M:%S");

        let now = Local::now();
        let mut formatted = String::new();
        write!(formatted, "{}", now.format(format_string)).map_err(|_| {
            TooloopError::ToolError(format!("Invalid format string: {}", format_string))
        })?;

        let payload = json!({
            "current_datetime": formatted,
            "timestamp": now.timestamp(),
            "timezone": now.offset().to_string(),
        });

        Ok(payload.to_string())
    }

    fn definition(&self) -> Option<ToolDefinition> {
        Some(ToolDefinition::new(
            Self::NAME,
            "Get the current date and time. Useful when you need to know the current time or date.",
            json!({
                "type": "object",
                "properties": {
                    "format_string": {
                        "type": "string",
                        "description": "strftime format for the datetime (e.g. '%Y-%m-%d %H:%M:%S', '%A, %B %d, %Y'). Defaults to '%Y-%m-%d %H:%M:%S'."
                    }
                },
                "required": []
            }),
        ))
    }
}
