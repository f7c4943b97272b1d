use crate::error::Result;
use crate::llm::tools::{LlmTool, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

/// Adapts an async closure into an [`LlmTool`]
///
/// ```ignore
/// let echo = FnTool::new(|input: Value| async move {
///     Ok(input["text"].as_str().unwrap_or_default().to_uppercase())
/// });
/// ```
pub struct FnTool<F> {
    func: F,
    definition: Option<ToolDefinition>,
}

impl<F> FnTool<F> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            definition: None,
        }
    }

    /// Attach the definition advertised to the model
    pub fn with_definition(mut self, definition: ToolDefinition) -> Self {
        self.definition = Some(definition);
        self
    }
}

#[async_trait]
impl<F, Fut, R> LlmTool for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send,
    R: ToString + Send,
{
    async fn run(&self, input: &Value) -> Result<String> {
        let output = (self.func)(input.clone()).await?;
        Ok(output.to_string())
    }

    fn definition(&self) -> Option<ToolDefinition> {
        self.definition.clone()
    }
}
