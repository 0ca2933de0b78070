//! Chat client for the bridge's Ollama-compatible `/api/chat`

use ollama_bridge::{ChatMessage, ChatRequest, ToolCall};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::error::AgentError;

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub host: String,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Non-streaming chat client, shared by every agent.
pub struct BridgeModel {
    client: Client,
    settings: ModelSettings,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl BridgeModel {
    pub fn new(settings: ModelSettings) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn model_id(&self) -> &str {
        &self.settings.model_id
    }

    fn options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("num_predict".to_string(), json!(self.settings.max_tokens));
        options.insert("temperature".to_string(), json!(self.settings.temperature));
        options
    }

    /// Send one chat turn and return the assistant message.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Vec<Map<String, Value>>,
    ) -> Result<ChatMessage, AgentError> {
        let mut request = ChatRequest::new(messages.to_vec());
        request.model = Some(self.settings.model_id.clone());
        request.stream = Some(false);
        request.options = Some(self.options());
        request.tools = Some(tools).filter(|t| !t.is_empty());

        let url = format!("{}/api/chat", self.settings.host.trim_end_matches('/'));
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api { status, body });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        Ok(ChatMessage::new(
            body.message.role.unwrap_or_else(|| "assistant".to_string()),
            body.message.content,
            body.message.tool_calls,
        ))
    }
}
