pub mod chat;
pub mod client;
pub mod gateway;
pub mod gateways;
pub mod models;
pub mod pricing;
pub mod tools;
pub mod usage;

pub use chat::{Chat, ChatBuilder, ToolLoopOptions};
pub use client::Client;
pub use gateway::{CompletionConfig, MessageRequest, MessagesGateway, StreamEvent, ToolChoice};
pub use models::{ContentBlock, Message, Response, Role, StopReason, Usage};
pub use pricing::{ModelTier, PricingTable, TokenRates};
pub use tools::{LlmTool, ToolDefinition, ToolRegistry};
pub use usage::UsageLedger;
