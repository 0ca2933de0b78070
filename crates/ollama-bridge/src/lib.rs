//! Ollama Bridge - HTTP proxy between the Strands SDK and a local Ollama server.
//!
//! The Strands `OllamaModel` speaks (almost) Ollama's native `/api/chat`
//! schema. This crate accepts that schema, normalizes the parts Ollama is
//! strict about (messages that carry only tool calls, optional fields sent as
//! `null`) and forwards the request. Responses, buffered or NDJSON-streamed,
//! are relayed back untouched.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod streaming;
pub mod translation;
pub mod types;

pub use backend::{OllamaBackend, Relay};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use server::serve;
pub use types::{ChatMessage, ChatRequest, ToolCall};
