use crate::error::{Result, TooloopError};
use crate::llm::gateway::{MessageRequest, MessagesGateway, StreamEvent};
use crate::llm::models::{Response, Usage};
use crate::llm::pricing::PricingTable;
use crate::llm::usage::UsageLedger;
use futures::stream::StreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Sends requests through a gateway and keeps track of what they cost
pub struct Client {
    model: String,
    gateway: Arc<dyn MessagesGateway>,
    ledger: UsageLedger,
    last_message: Option<Response>,
}

impl Client {
    /// Create a new client for `model`, priced with the built-in table
    pub fn new(model: impl Into<String>, gateway: Arc<dyn MessagesGateway>) -> Self {
        Self::with_pricing(model, gateway, PricingTable::default())
    }

    /// Create a new client with a custom pricing table
    pub fn with_pricing(
        model: impl Into<String>,
        gateway: Arc<dyn MessagesGateway>,
        pricing: PricingTable,
    ) -> Self {
        Self {
            model: model.into(),
            gateway,
            ledger: UsageLedger::new(pricing),
            last_message: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The most recent response, if any call has completed
    pub fn last_message(&self) -> Option<&Response> {
        self.last_message.as_ref()
    }

    /// Accumulated token usage
    pub fn usage(&self) -> Usage {
        self.ledger.totals()
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut UsageLedger {
        &mut self.ledger
    }

    /// Cost in USD of everything this client has sent so far
    pub fn cost(&self) -> Result<f64> {
        self.ledger.cost(&self.model)
    }

    /// Send one request and return the complete response.
    ///
    /// With `request.stream` set, intermediate deltas are dropped and the final
    /// assembled message is returned; a stream that ends without one fails with
    /// [`TooloopError::IncompleteStream`].
    pub async fn create_message(&mut self, request: &MessageRequest) -> Result<Response> {
        let message = if request.stream {
            self.collect_stream(request).await?
        } else {
            self.gateway.create_message(request).await?
        };

        debug!(
            id = %message.id,
            input_tokens = message.usage.input_tokens,
            output_tokens = message.usage.output_tokens,
            "Message received"
        );

        self.ledger.record(Some(&message.usage));
        self.last_message = Some(message.clone());
        Ok(message)
    }

    async fn collect_stream(&self, request: &MessageRequest) -> Result<Response> {
        let mut stream = self.gateway.stream_message(request);
        let mut final_message = None;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta { index, text } => trace!(index, text = %text, "Text delta"),
                StreamEvent::InputJsonDelta { index, .. } => trace!(index, "Tool input delta"),
                StreamEvent::Message(message) => final_message = Some(*message),
            }
        }

        final_message.ok_or(TooloopError::IncompleteStream)
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.last_message.is_none() {
            return write!(f, "No results yet");
        }

        let usage = self.usage();
        write!(
            f,
            "Usage: Input tokens: {}, Output tokens: {}, ",
            usage.input_tokens, usage.output_tokens
        )?;
        match self.cost() {
            Ok(cost) => write!(f, "Cost: ${:.6}", cost),
            Err(_) => write!(f, "Cost: unknown"),
        }
    }
}
