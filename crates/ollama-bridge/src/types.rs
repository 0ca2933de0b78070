//! Client-facing wire types.
//!
//! Requests arrive in the shape the Strands SDK `OllamaModel` sends, which is
//! close to Ollama's native `/api/chat` schema but looser:
//! - `content` may be missing or `null` on assistant messages that only carry
//!   `tool_calls`.
//! - `model` and `stream` may be omitted.
//!
//! `ChatMessage` always satisfies "has content or tool calls" once built, no
//! matter which path (deserialization or [`ChatMessage::new`]) produced it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool invocation embedded in a message. `function` is passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: Map<String, Value>,
}

/// A chat message in the client schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawChatMessage")]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct RawChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl From<RawChatMessage> for ChatMessage {
    fn from(raw: RawChatMessage) -> Self {
        ChatMessage::new(raw.role, raw.content, raw.tool_calls)
    }
}

impl ChatMessage {
    /// Build a message, defaulting `content` to `""` when neither content nor
    /// tool calls carry anything.
    pub fn new(
        role: impl Into<String>,
        content: Option<String>,
        tool_calls: Option<Vec<ToolCall>>,
    ) -> Self {
        let empty_content = content.as_deref().map_or(true, str::is_empty);
        let empty_calls = tool_calls.as_ref().map_or(true, Vec::is_empty);
        let content = if empty_content && empty_calls {
            Some(content.unwrap_or_default())
        } else {
            content
        };

        Self {
            role: role.into(),
            content,
            tool_calls,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", Some(content.into()), None)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", Some(content.into()), None)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new("tool", Some(content.into()), None)
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Falls back to the configured default model when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            stream: None,
            options: None,
            tools: None,
            keep_alive: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    pub fn model_or<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(default_model)
    }
}

/// Backend availability as seen by the health checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    Healthy,
    Unhealthy,
}

/// Result of one backend health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHealth {
    pub status: BackendStatus,
    pub models: Vec<String>,
}

impl BackendHealth {
    pub fn unhealthy() -> Self {
        Self {
            status: BackendStatus::Unhealthy,
            models: Vec::new(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == BackendStatus::Healthy
    }
}

/// Service-level status. The service itself keeps serving when the backend is
/// down, so it is never reported as unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub timestamp: String,
    pub ollama_status: BackendStatus,
    pub available_models: Vec<String>,
}

impl HealthResponse {
    pub fn from_backend(health: BackendHealth, timestamp: String) -> Self {
        let status = if health.is_healthy() {
            ServiceStatus::Healthy
        } else {
            ServiceStatus::Degraded
        };
        Self {
            status,
            timestamp,
            ollama_status: health.status,
            available_models: health.models,
        }
    }
}
