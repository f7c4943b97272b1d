pub mod error;
pub mod llm;

pub use error::{Result, TooloopError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Result, TooloopError};
    pub use crate::llm::gateways::AnthropicGateway;
    pub use crate::llm::tools::{CurrentDatetimeTool, LlmTool, ToolDefinition};
    pub use crate::llm::{Chat, Client, CompletionConfig, Message, Response, ToolLoopOptions};
}
