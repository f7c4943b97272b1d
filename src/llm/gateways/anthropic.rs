//! Anthropic Messages API gateway.
//!
//! This module provides a gateway for the hosted Messages endpoint, covering
//! whole-message creation and server-sent-event streaming.

use crate::error::{Result, TooloopError};
use crate::llm::gateway::{MessageRequest, MessagesGateway, StreamEvent};
use crate::llm::gateways::anthropic_stream::MessageAssembler;
use crate::llm::models::Response;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde_json::Value;
use std::pin::Pin;
use tracing::{debug, info, trace};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for connecting to the Anthropic API.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub version: String,
    pub timeout: Option<std::time::Duration>,
}

impl AnthropicConfig {
    /// Read the configuration from the environment, loading `.env` first if present.
    ///
    /// Uses `ANTHROPIC_API_KEY` and `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            version: ANTHROPIC_VERSION.to_string(),
            timeout: None,
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Gateway for the Anthropic Messages API.
pub struct AnthropicGateway {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicGateway {
    /// Create a new gateway configured from the environment.
    pub fn new() -> Result<Self> {
        Self::with_config(AnthropicConfig::default())
    }

    /// Create a new gateway with custom configuration.
    ///
    /// Fails with [`TooloopError::ConfigError`] when no API key is set.
    pub fn with_config(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TooloopError::ConfigError(
                "ANTHROPIC_API_KEY is not set".to_string(),
            ));
        }

        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    /// Create gateway with custom API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(AnthropicConfig {
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    /// Create gateway with custom API key and base URL.
    pub fn with_api_key_and_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Self::with_config(AnthropicConfig {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    fn request_body(&self, request: &MessageRequest, stream: bool) -> Result<Value> {
        let mut body = serde_json::to_value(request)?;
        body["stream"] = Value::Bool(stream);
        Ok(body)
    }

    async fn post_messages(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.version)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &error_text));
        }

        Ok(response)
    }
}

/// Turn a non-success response into an error, preferring the API's own error envelope.
fn api_error(status: reqwest::StatusCode, body: &str) -> TooloopError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    match parsed.as_ref().and_then(|v| v["error"]["message"].as_str()) {
        Some(message) => {
            let error_type = parsed
                .as_ref()
                .and_then(|v| v["error"]["type"].as_str())
                .unwrap_or("error");
            TooloopError::ApiError(format!("{} {}: {}", status, error_type, message))
        }
        None => TooloopError::GatewayError(format!("Anthropic API error: {} - {}", status, body)),
    }
}

#[async_trait]
impl MessagesGateway for AnthropicGateway {
    async fn create_message(&self, request: &MessageRequest) -> Result<Response> {
        info!("Delegating to Anthropic for message creation");
        debug!("Model: {}, Message count: {}", request.model, request.messages.len());

        let body = self.request_body(request, false)?;
        let response = self.post_messages(&body).await?;
        let message: Response = response.json().await?;

        Ok(message)
    }

    fn stream_message<'a>(
        &'a self,
        request: &'a MessageRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'a>> {
        Box::pin(async_stream::stream! {
            info!("Starting Anthropic streaming message");
            debug!("Model: {}, Message count: {}", request.model, request.messages.len());

            let body = match self.request_body(request, true) {
                Ok(body) => body,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let response = match self.post_messages(&body).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut assembler = MessageAssembler::new();

            while let Some(chunk_result) = stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(e.into());
                        return;
                    }
                };
                buffer.extend_from_slice(&bytes);

                // Process complete SSE lines
                while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=line_end).collect();
                    match apply_sse_line(&mut assembler, &line_bytes) {
                        Ok(Some(event)) => yield Ok(event),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            // A last line may arrive without its trailing newline
            if !buffer.is_empty() {
                match apply_sse_line(&mut assembler, &buffer) {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => {}
                    Err(e) => yield Err(e),
                }
            }
        })
    }
}

/// Feed one SSE line to the assembler; lines other than `data:` are skipped
fn apply_sse_line(assembler: &mut MessageAssembler, line: &[u8]) -> Result<Option<StreamEvent>> {
    let line = String::from_utf8_lossy(line);
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();
    trace!(data, "SSE event");
    assembler.apply_data(data)
}
