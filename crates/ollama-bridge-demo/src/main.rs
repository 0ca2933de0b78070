//! Two calculator-equipped agents asking one question each through the bridge.

use anyhow::Result;
use clap::Parser;
use ollama_bridge::logging::init_tracing;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod agent;
mod calculator;
mod error;
mod model;
mod tools;

use agent::Agent;
use calculator::Calculator;
use model::{BridgeModel, ModelSettings};

const MATH_PROMPT: &str = "You are a Math Agent, an expert mathematician.

You have access to a calculator tool. Use it for all mathematical calculations.
Be concise and show your work.";

const RESEARCH_PROMPT: &str = "You are a Research Agent, expert at data analysis.

You have access to a calculator tool for statistical calculations.
Be analytical and show your mathematical work.";

/// Ask scripted questions to tool-calling agents backed by ollama-bridge
#[derive(Parser, Debug)]
#[command(name = "ollama-bridge-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the bridge
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:8000")]
    host: String,

    /// Model to request
    #[arg(short, long, env = "OLLAMA_MODEL", default_value = "llama3.1:8b")]
    model: String,

    /// Maximum tokens per reply (`num_predict`)
    #[arg(long, env = "MAX_TOKENS", default_value_t = 300)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long, env = "TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Request timeout in seconds
    #[arg(long, env = "TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Tool rounds allowed before an agent gives up
    #[arg(long, default_value_t = 5)]
    max_tool_rounds: usize,

    /// Also append logs to this file
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    info!("Starting ollama-bridge demo");

    let model = Arc::new(BridgeModel::new(ModelSettings {
        host: cli.host.clone(),
        model_id: cli.model.clone(),
        max_tokens: cli.max_tokens,
        temperature: cli.temperature,
        timeout_secs: cli.timeout,
    })?);
    info!(host = %cli.host, model = %model.model_id(), "using bridge");

    let math_agent = Agent::new("Math Agent", model.clone(), MATH_PROMPT)
        .with_tool(Calculator)
        .with_max_tool_rounds(cli.max_tool_rounds);
    let research_agent = Agent::new("Research Agent", model, RESEARCH_PROMPT)
        .with_tool(Calculator)
        .with_max_tool_rounds(cli.max_tool_rounds);
    info!("Agents initialized");

    let script = [
        (&math_agent, "What is the square root of 144?"),
        (
            &research_agent,
            "Calculate the average of these numbers: 10, 15, 20, 25, 30",
        ),
    ];

    let mut failures = 0;
    for (agent, question) in script {
        info!(agent = agent.name(), question, "asking");
        match agent.ask(question).await {
            Ok(answer) => {
                info!(agent = agent.name(), answer = %answer, "answered");
                println!("\n{}", agent.name().to_uppercase());
                println!("Question: {}", question);
                println!("Answer: {}", answer);
            }
            Err(e) => {
                failures += 1;
                error!(agent = agent.name(), error = %e, "agent failed");
                println!("\n{} failed: {}", agent.name(), e);
            }
        }
        println!("\n{}", "=".repeat(50));
    }

    info!(failures, "demo finished");
    println!("\nDemo completed.");
    Ok(())
}
