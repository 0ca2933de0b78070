//! Minimal tool-calling agent loop

use ollama_bridge::{ChatMessage, ToolCall};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::model::BridgeModel;
use crate::tools::Tool;

pub struct Agent {
    name: String,
    model: Arc<BridgeModel>,
    system_prompt: String,
    tools: Vec<Box<dyn Tool>>,
    max_tool_rounds: usize,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        model: Arc<BridgeModel>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            max_tool_rounds: 5,
        }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask a question, running requested tools until the model answers in text.
    pub async fn ask(&self, question: &str) -> Result<String, AgentError> {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(question),
        ];
        let specs: Vec<_> = self.tools.iter().map(|t| t.spec()).collect();

        for round in 0..=self.max_tool_rounds {
            let reply = self.model.chat(&messages, specs.clone()).await?;
            let calls = match &reply.tool_calls {
                Some(calls) if !calls.is_empty() => calls.clone(),
                _ => return Ok(reply.content.unwrap_or_default()),
            };

            if round == self.max_tool_rounds {
                break;
            }

            info!(agent = %self.name, round, calls = calls.len(), "running tool calls");
            messages.push(reply);
            for call in &calls {
                messages.push(ChatMessage::tool(self.run_tool(call)));
            }
        }

        Err(AgentError::TooManyToolRounds(self.max_tool_rounds))
    }

    fn run_tool(&self, call: &ToolCall) -> String {
        let name = call
            .function
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let arguments = tool_arguments(call);

        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            warn!(agent = %self.name, tool = name, "model requested an unknown tool");
            return format!("Error: unknown tool '{}'", name);
        };

        let output = tool.call(&arguments).unwrap_or_else(|e| e);
        debug!(agent = %self.name, tool = name, %arguments, output = %output, "tool finished");
        output
    }
}

/// Ollama sends arguments as an object; some models emit a JSON string instead.
fn tool_arguments(call: &ToolCall) -> Value {
    match call.function.get("arguments") {
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or_else(|_| json!({})),
        Some(args) => args.clone(),
        None => json!({}),
    }
}
