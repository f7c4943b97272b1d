//! Name-keyed registry of tool implementations.

use crate::error::{Result, TooloopError};
use crate::llm::models::{ContentBlock, ToolUse};
use crate::llm::tools::{FnTool, LlmTool};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps tool names to the implementations that answer tool-use requests.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn LlmTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation under `name`, replacing any previous one
    pub fn register(&mut self, name: impl Into<String>, tool: Arc<dyn LlmTool>) {
        self.tools.insert(name.into(), tool);
    }

    /// Register an async closure under `name`
    pub fn register_fn<F, Fut, R>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: ToString + Send + 'static,
    {
        self.register(name, Arc::new(FnTool::new(func)));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn LlmTool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Answer every tool-use request with one tool-result block.
    ///
    /// All names are resolved before anything runs, so an unregistered tool fails the
    /// whole batch with [`TooloopError::ToolNotFound`] and no tool is executed. The
    /// resolved tools then run concurrently. A tool that fails yields an `"Error: ..."`
    /// result flagged `is_error`. Results come back in request order.
    pub async fn execute_all(&self, requests: &[ToolUse<'_>]) -> Result<Vec<ContentBlock>> {
        let resolved = requests
            .iter()
            .map(|request| {
                self.get(request.name)
                    .map(|tool| (request, Arc::clone(tool)))
                    .ok_or_else(|| TooloopError::ToolNotFound(request.name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let executions = resolved.into_iter().map(|(request, tool)| async move {
            debug!(tool = request.name, id = request.id, "Executing tool");
            match tool.run(request.input).await {
                Ok(content) => ContentBlock::tool_result(request.id, content),
                Err(e) => {
                    warn!(tool = request.name, error = %e, "Tool execution failed");
                    ContentBlock::ToolResult {
                        tool_use_id: request.id.to_string(),
                        content: format!("Error: {}", failure_message(e)),
                        is_error: true,
                    }
                }
            }
        });

        Ok(join_all(executions).await)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

fn failure_message(err: TooloopError) -> String {
    match err {
        TooloopError::ToolError(message) => message,
        other => other.to_string(),
    }
}
