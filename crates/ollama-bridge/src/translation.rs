//! Client schema -> Ollama `/api/chat` schema.
//!
//! Responses are never translated back: Strands expects Ollama's native
//! response format, so the forwarder relays them untouched.

use crate::types::{ChatMessage, ChatRequest};
use serde::Serialize;
use serde_json::{Map, Value};

/// A message in Ollama's native chat schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaToolCall {
    pub function: Map<String, Value>,
}

/// Request body for Ollama's `/api/chat`. Optional fields are omitted, never
/// sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

/// Convert one client message into Ollama's schema.
///
/// Empty `content` is dropped, only `function` is carried over from each tool
/// call, and a message left with neither gets `content: ""`.
pub fn convert_message(message: &ChatMessage) -> OllamaMessage {
    let content = message
        .content
        .as_ref()
        .filter(|c| !c.is_empty())
        .cloned();

    let tool_calls = message
        .tool_calls
        .as_ref()
        .filter(|calls| !calls.is_empty())
        .map(|calls| {
            calls
                .iter()
                .map(|call| OllamaToolCall {
                    function: call.function.clone(),
                })
                .collect::<Vec<_>>()
        });

    let content = match (&content, &tool_calls) {
        (None, None) => Some(String::new()),
        _ => content,
    };

    OllamaMessage {
        role: message.role.clone(),
        content,
        tool_calls,
    }
}

/// Build the backend request for a chat call.
///
/// `options`, `tools` and `keep_alive` are forwarded only when non-empty; an
/// empty map, list or string is treated the same as a missing one.
pub fn convert_chat_request(req: &ChatRequest, default_model: &str) -> OllamaChatRequest {
    OllamaChatRequest {
        model: req.model_or(default_model).to_string(),
        messages: req.messages.iter().map(convert_message).collect(),
        stream: req.is_streaming(),
        options: req.options.clone().filter(|o| !o.is_empty()),
        tools: req.tools.clone().filter(|t| !t.is_empty()),
        keep_alive: req.keep_alive.clone().filter(|k| !k.is_empty()),
    }
}
