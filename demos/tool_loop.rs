//! Tool Loop Example
//!
//! Asks Claude a question that needs two local tools, answers every tool-use
//! request it makes, and prints the final answer and what the conversation cost.
//!
//! Requires ANTHROPIC_API_KEY (a `.env` file works too).
//!
//! Run with: cargo run --example tool_loop

use anyhow::Context;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tooloop::llm::gateways::AnthropicGateway;
use tooloop::llm::tools::{CurrentDatetimeTool, FnTool, ToolDefinition};
use tooloop::llm::{Chat, Client, ToolLoopOptions};
use tooloop::TooloopError;

/// Days to add to a date
#[derive(Debug, Deserialize, JsonSchema)]
struct AddDays {
    /// Date in YYYY-MM-DD format
    date: String,
    /// Number of days to add, may be negative
    days: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let gateway = Arc::new(AnthropicGateway::new().context("creating gateway")?);
    let client = Client::new("claude-3-5-haiku-20241022", gateway);

    let add_days = FnTool::new(|input: Value| async move {
        let args: AddDays = serde_json::from_value(input)?;
        let date = chrono::NaiveDate::parse_from_str(&args.date, "%Y-%m-%d")
            .map_err(|e| TooloopError::ToolError(format!("Invalid date: {}", e)))?;
        Ok::<_, TooloopError>(
            (date + chrono::Duration::days(args.days)).format("%Y-%m-%d").to_string(),
        )
    })
    .with_definition(ToolDefinition::for_input::<AddDays>(
        "add_days",
        "Add a number of days to a date",
    )?);

    let mut chat = Chat::builder(client)
        .system_prompt("You are a helpful assistant. Use the tools to work out dates.")
        .tool(CurrentDatetimeTool::new())
        .tool(add_days)
        .continue_prompt("Continue")
        .build();

    let question = "What will the date be 100 days from today?";
    println!("User: {}\n", question);

    let options = ToolLoopOptions::new().max_steps(5).trace(|response| {
        for tool_use in response.tool_uses() {
            println!("  -> {} {}", tool_use.name, tool_use.input);
        }
        Ok(())
    });

    let answer = chat.tool_loop(Some(question), options).await?;
    println!("\nAssistant: {}", answer.text());

    println!("\n{}", chat.client());
    println!("Conversation cost: ${:.6}", chat.cost()?);

    Ok(())
}
