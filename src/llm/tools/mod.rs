pub mod current_datetime_tool;
mod fn_tool;
pub mod registry;
mod tool;

pub use current_datetime_tool::CurrentDatetimeTool;
pub use fn_tool::FnTool;
pub use registry::ToolRegistry;
pub use tool::{LlmTool, ToolDefinition};
