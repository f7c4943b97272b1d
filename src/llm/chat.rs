//! Conversation facade with a bounded tool-use loop.
//!
//! [`Chat`] owns the history of one conversation, the client that talks to the
//! model and the registry of local tool implementations. [`Chat::tool_loop`]
//! keeps answering the model's tool-use requests until it produces a final
//! answer, a step budget runs out, or a continuation predicate says stop.

use crate::error::{Result, TooloopError};
use crate::llm::client::Client;
use crate::llm::gateway::{CompletionConfig, MessageRequest};
use crate::llm::models::{Message, Response, Role};
use crate::llm::tools::{LlmTool, ToolDefinition, ToolRegistry};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_MAX_STEPS: usize = 10;

type TraceFn<'a> = Box<dyn FnMut(&Response) -> Result<()> + Send + 'a>;
type ContinueFn<'a> = Box<dyn FnMut(&Response) -> bool + Send + 'a>;

/// Options for [`Chat::tool_loop`]
///
/// # Examples
///
/// ```ignore
/// let options = ToolLoopOptions::new()
///     .max_steps(5)
///     .trace(|response| {
///         println!("{}", response.text());
///         Ok(())
///     })
///     .continue_while(|response| !response.text().contains("STOP"));
/// ```
pub struct ToolLoopOptions<'a> {
    max_steps: usize,
    config: CompletionConfig,
    trace: Option<TraceFn<'a>>,
    continue_while: Option<ContinueFn<'a>>,
}

impl<'a> ToolLoopOptions<'a> {
    pub fn new() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            config: CompletionConfig::default(),
            trace: None,
            continue_while: None,
        }
    }

    /// Maximum number of tool-driven round trips after the first send (default: 10)
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Options applied to every send of the loop
    pub fn config(mut self, config: CompletionConfig) -> Self {
        self.config = config;
        self
    }

    /// Called with each response that requests tools, and once more with the last one
    /// unless the continuation predicate stopped the loop. An error from the callback
    /// aborts the loop.
    pub fn trace(mut self, trace: impl FnMut(&Response) -> Result<()> + Send + 'a) -> Self {
        self.trace = Some(Box::new(trace));
        self
    }

    /// Checked before tools are executed; returning `false` ends the loop
    pub fn continue_while(mut self, predicate: impl FnMut(&Response) -> bool + Send + 'a) -> Self {
        self.continue_while = Some(Box::new(predicate));
        self
    }

    fn run_trace(&mut self, response: &Response) -> Result<()> {
        match self.trace.as_mut() {
            Some(trace) => trace(response),
            None => Ok(()),
        }
    }

    fn should_continue(&mut self, response: &Response) -> bool {
        self.continue_while.as_mut().map_or(true, |predicate| predicate(response))
    }
}

impl Default for ToolLoopOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// One conversation with the model.
///
/// `Chat` is not meant to be shared: every call takes `&mut self`, so sends on one
/// conversation are serialized by the borrow checker.
///
/// # Examples
///
/// ```ignore
/// use tooloop::llm::gateways::AnthropicGateway;
/// use tooloop::llm::{Chat, Client, CompletionConfig};
/// use std::sync::Arc;
///
/// let gateway = Arc::new(AnthropicGateway::new()?);
/// let client = Client::new("claude-3-5-sonnet-20241022", gateway);
/// let mut chat = Chat::builder(client)
///     .system_prompt("You are a helpful assistant.")
///     .build();
///
/// let response = chat.send(Some("Hello!"), CompletionConfig::default()).await?;
/// println!("{}", response.text());
/// ```
pub struct Chat {
    client: Client,
    history: Vec<Message>,
    system_prompt: Option<String>,
    tools: Vec<ToolDefinition>,
    registry: ToolRegistry,
    temperature: f32,
    max_tokens: u32,
    continue_prompt: Option<String>,
}

impl Chat {
    /// Create a chat with default settings
    pub fn new(client: Client) -> Self {
        Self::builder(client).build()
    }

    /// Create a chat builder for custom configuration
    pub fn builder(client: Client) -> ChatBuilder {
        ChatBuilder::new(client)
    }

    /// Send a prompt, or continue the conversation when `prompt` is `None`.
    ///
    /// - If a prompt is given while the last turn is still an unanswered user turn,
    ///   that turn is sent first and its response recorded, then the prompt is appended.
    /// - With no prompt, a pending user turn is sent as is. If there is none, the
    ///   configured continuation prompt is appended; without one this fails with
    ///   [`TooloopError::ContinuationError`].
    ///
    /// Fails with [`TooloopError::UnansweredToolUse`] while the last turn still has
    /// tool-use requests without results; see [`Chat::answer_pending_tools`].
    ///
    /// The response is appended to the history and returned.
    pub async fn send(&mut self, prompt: Option<&str>, config: CompletionConfig) -> Result<Response> {
        let unanswered = self.unanswered_tool_ids();
        if !unanswered.is_empty() {
            return Err(TooloopError::UnansweredToolUse(unanswered));
        }

        let pending_user_turn = self.last_role() == Some(Role::User);

        match prompt {
            Some(prompt) => {
                if pending_user_turn {
                    debug!("Flushing pending user turn before new prompt");
                    self.dispatch(&config).await?;
                }
                self.history.push(Message::user(prompt));
            }
            None if pending_user_turn => {}
            None => match &self.continue_prompt {
                Some(text) => self.history.push(Message::user(text.clone())),
                None => {
                    return Err(TooloopError::ContinuationError(
                        "no prompt given, no continuation prompt configured and no pending user turn"
                            .to_string(),
                    ))
                }
            },
        }

        self.dispatch(&config).await
    }

    /// Run the tool-use loop.
    ///
    /// Sends `prompt` (see [`Chat::send`]), then as long as the model requests tools:
    /// traces the response, asks the continuation predicate, runs every requested
    /// tool concurrently and sends all results back in one user turn. Stops when a
    /// response requests no tools, when the predicate returns `false`, or after
    /// `max_steps` tool-driven sends; in all three cases the last response is
    /// returned. An unregistered tool name fails the loop before the next send.
    pub async fn tool_loop(
        &mut self,
        prompt: Option<&str>,
        mut options: ToolLoopOptions<'_>,
    ) -> Result<Response> {
        let mut response = self.send(prompt, options.config.clone()).await?;
        let mut steps = 0;

        loop {
            if !response.has_tool_use() {
                break;
            }

            if steps == options.max_steps {
                warn!(max_steps = options.max_steps, "Tool loop step budget exhausted");
                break;
            }

            options.run_trace(&response)?;

            if !options.should_continue(&response) {
                info!("Tool loop stopped by continuation predicate");
                return Ok(response);
            }

            debug!(step = steps + 1, "Tool loop step");
            self.answer_pending_tools().await?;

            response = self.send(None, options.config.clone()).await?;
            steps += 1;
        }

        options.run_trace(&response)?;
        Ok(response)
    }

    /// Run the tools requested by the last turn and append their results.
    ///
    /// Resumes a conversation left with unanswered tool use, for example after the
    /// continuation predicate stopped [`Chat::tool_loop`] or a missing tool was
    /// registered. Returns the number of results appended; a follow-up
    /// `send(None, ..)` then delivers them to the model.
    pub async fn answer_pending_tools(&mut self) -> Result<usize> {
        let results = match self.history.last() {
            Some(last) if last.role == Role::Assistant => {
                let tool_uses = last.tool_uses();
                if tool_uses.is_empty() {
                    return Ok(0);
                }
                info!(tools = tool_uses.len(), "Executing requested tools");
                self.registry.execute_all(&tool_uses).await?
            }
            _ => return Ok(0),
        };

        let count = results.len();
        self.history.push(Message::tool_results(results));
        Ok(count)
    }

    /// Register a tool implementation under `name`
    pub fn register_tool(&mut self, name: impl Into<String>, tool: impl LlmTool + 'static) {
        self.registry.register(name, Arc::new(tool));
    }

    /// Register an async closure as the implementation of `name`
    pub fn register_fn<F, Fut, R>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: ToString + Send + 'static,
    {
        self.registry.register_fn(name, func);
    }

    /// Cost in USD of the whole conversation so far
    pub fn cost(&self) -> Result<f64> {
        self.client.cost()
    }

    /// The conversation history, oldest turn first
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Tool definitions advertised to the model
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn last_role(&self) -> Option<Role> {
        self.history.last().map(|m| m.role)
    }

    fn unanswered_tool_ids(&self) -> Vec<String> {
        match self.history.last() {
            Some(last) if last.role == Role::Assistant => {
                last.tool_uses().iter().map(|t| t.id.to_string()).collect()
            }
            _ => Vec::new(),
        }
    }

    async fn dispatch(&mut self, config: &CompletionConfig) -> Result<Response> {
        let request = MessageRequest {
            model: self.client.model().to_string(),
            messages: self.history.clone(),
            system: self.system_prompt.clone(),
            temperature: config.temperature.unwrap_or(self.temperature),
            max_tokens: config.max_tokens.unwrap_or(self.max_tokens),
            tools: (!self.tools.is_empty()).then(|| self.tools.clone()),
            tool_choice: config.tool_choice.clone(),
            stream: config.stream,
        };

        let response = self.client.create_message(&request).await?;
        self.history.push(response.to_message());
        Ok(response)
    }
}

impl fmt::Display for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(last) = self.client.last_message() else {
            return write!(f, "No messages yet");
        };

        write!(f, "{}\n\n", last.text())?;
        match self.cost() {
            Ok(cost) => write!(f, "Cost: ${:.6}", cost),
            Err(_) => write!(f, "Cost: unknown"),
        }
    }
}

/// Builder for constructing a `Chat` with custom configuration.
pub struct ChatBuilder {
    client: Client,
    system_prompt: Option<String>,
    tools: Vec<ToolDefinition>,
    registry: ToolRegistry,
    temperature: f32,
    max_tokens: u32,
    continue_prompt: Option<String>,
}

impl ChatBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            system_prompt: None,
            tools: Vec::new(),
            registry: ToolRegistry::new(),
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            continue_prompt: None,
        }
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the sampling temperature (default: 0.0)
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum output tokens per call (default: 4096)
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Advertise tool definitions; implementations are registered separately
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Advertise and register a self-describing tool
    pub fn tool(mut self, tool: impl LlmTool + 'static) -> Self {
        match tool.definition() {
            Some(definition) => {
                self.registry.register(definition.name.clone(), Arc::new(tool));
                self.tools.push(definition);
            }
            None => warn!("Ignoring tool without a definition; use register_tool instead"),
        }
        self
    }

    /// Text appended as the user turn when continuing without a prompt
    pub fn continue_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.continue_prompt = Some(prompt.into());
        self
    }

    /// Build the chat
    pub fn build(self) -> Chat {
        Chat {
            client: self.client,
            history: Vec::new(),
            system_prompt: self.system_prompt,
            tools: self.tools,
            registry: self.registry,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            continue_prompt: self.continue_prompt,
        }
    }
}
