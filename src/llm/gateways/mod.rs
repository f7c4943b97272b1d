pub mod anthropic;
pub(crate) mod anthropic_stream;

pub use anthropic::{AnthropicConfig, AnthropicGateway};
