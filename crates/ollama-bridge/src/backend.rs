//! Ollama backend client.
//!
//! One pooled `reqwest::Client` is shared by every request handler. All calls
//! are single-shot: failures are classified into [`BridgeError`] and returned,
//! never retried.
//!
//! The request timeout bounds the wait for response headers and every gap
//! between body reads, never the total length of a response. A stream that
//! keeps producing lines runs until the backend closes it.

use crate::{
    config::BridgeConfig,
    error::{BridgeError, BridgeResult},
    streaming,
    translation::{self, OllamaChatRequest},
    types::{BackendHealth, BackendStatus, ChatRequest},
};
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// What the caller gets back from a forwarded call.
pub enum Relay {
    /// A complete JSON document, exactly as the backend sent it.
    Json(Bytes),
    /// Newline-terminated NDJSON lines, forwarded as they arrive.
    Lines(BoxStream<'static, Result<Bytes, BridgeError>>),
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relay::Json(body) => f.debug_tuple("Json").field(body).finish(),
            Relay::Lines(_) => f.write_str("Lines(..)"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Clone)]
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(config: &BridgeConfig) -> BridgeResult<Self> {
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .read_timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(CONNECT_TIMEOUT_SECS)))
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &BridgeConfig) -> Self {
        Self {
            client,
            base_url: config.ollama_base_url_trimmed().to_string(),
            default_model: config.default_model.clone(),
            timeout: config.request_timeout(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and wait at most the request timeout for its headers.
    async fn send(&self, request: reqwest::RequestBuilder) -> BridgeResult<reqwest::Response> {
        match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(BridgeError::Timeout),
        }
    }

    /// Probe `/api/tags`. Never fails: any problem yields an unhealthy result.
    pub async fn check_health(&self) -> BackendHealth {
        let response = match self.send(self.client.get(self.url("/api/tags"))).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Ollama health check failed");
                return BackendHealth::unhealthy();
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!(status = %response.status(), "Ollama health check returned non-200");
            return BackendHealth::unhealthy();
        }

        match response.json::<TagsResponse>().await {
            Ok(tags) => BackendHealth {
                status: BackendStatus::Healthy,
                models: tags.models.into_iter().map(|m| m.name).collect(),
            },
            Err(e) => {
                error!(error = %e, "Ollama health check returned an unreadable model list");
                BackendHealth::unhealthy()
            }
        }
    }

    /// Pass `/api/tags` through verbatim.
    ///
    /// Any transport failure, a timeout included, reports the backend as
    /// unavailable.
    pub async fn list_models(&self) -> BridgeResult<Bytes> {
        let response = self
            .send(self.client.get(self.url("/api/tags")))
            .await
            .map_err(|e| match e {
                BridgeError::Timeout => BridgeError::Unavailable,
                other => other,
            })
            .inspect_err(|e| error!(error = %e, "failed to connect to Ollama"))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(BridgeError::Internal(format!(
                "Failed to fetch models: {}",
                response.status().as_u16()
            )));
        }
        read_json_verbatim(response).await
    }

    /// Pass `/api/show` through verbatim.
    ///
    /// A backend 404 becomes `NotFound`; every other failure is internal.
    pub async fn show_model(&self, name: &str) -> BridgeResult<Bytes> {
        self.fetch_model(name)
            .await
            .map_err(BridgeError::into_internal)
            .inspect_err(|e| error!(error = %e, model = name, "get model info failed"))
    }

    async fn fetch_model(&self, name: &str) -> BridgeResult<Bytes> {
        let response = self
            .send(
                self.client
                    .post(self.url("/api/show"))
                    .json(&json!({ "name": name })),
            )
            .await?;

        match response.status() {
            reqwest::StatusCode::OK => read_json_verbatim(response).await,
            reqwest::StatusCode::NOT_FOUND => Err(BridgeError::NotFound {
                model: name.to_string(),
            }),
            status => Err(BridgeError::Internal(format!(
                "Failed to get model info: {}",
                status.as_u16()
            ))),
        }
    }

    /// Reshape and forward a chat request.
    pub async fn chat(&self, request: &ChatRequest) -> BridgeResult<Relay> {
        let model = request.model_or(&self.default_model).to_string();
        info!(model = %model, messages = request.messages.len(), "processing chat request");
        for (i, msg) in request.messages.iter().enumerate() {
            debug!(
                index = i,
                role = %msg.role,
                has_content = msg.has_content(),
                has_tool_calls = msg.has_tool_calls(),
                "chat message"
            );
        }

        let outgoing = translation::convert_chat_request(request, &self.default_model);
        self.forward_chat(&outgoing)
            .await
            .inspect_err(|e| {
                error!(
                    error = %e,
                    model = %model,
                    messages = request.messages.len(),
                    "chat completion failed"
                )
            })
    }

    async fn forward_chat(&self, outgoing: &OllamaChatRequest) -> BridgeResult<Relay> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string_pretty(outgoing) {
                Ok(body) => debug!(body = %body, "forwarding request to Ollama"),
                Err(e) => debug!(error = %e, "could not render outgoing request"),
            }
        }

        let started = Instant::now();
        let response = self
            .send(self.client.post(self.url("/api/chat")).json(outgoing))
            .await
            .inspect_err(|e| {
                error!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Ollama chat request failed"
                )
            })?;

        info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            status = response.status().as_u16(),
            "Ollama responded"
        );

        let response = ensure_success(response).await?;
        if outgoing.stream {
            Ok(Relay::Lines(
                streaming::relay_lines(response.bytes_stream()).boxed(),
            ))
        } else {
            let body = read_json_verbatim(response).await?;
            debug!(body = %String::from_utf8_lossy(&body), "Ollama response received");
            Ok(Relay::Json(body))
        }
    }

    /// Forward a raw `/api/generate` body unchanged.
    ///
    /// Ollama streams generate responses unless `"stream": false` is given, so
    /// the relay mode follows the same rule. Every failure before the relay
    /// starts is internal.
    pub async fn generate(&self, body: &Value) -> BridgeResult<Relay> {
        self.forward_generate(body)
            .await
            .map_err(BridgeError::into_internal)
            .inspect_err(|e| error!(error = %e, "generate completion failed"))
    }

    async fn forward_generate(&self, body: &Value) -> BridgeResult<Relay> {
        let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(true);
        let response = self
            .send(self.client.post(self.url("/api/generate")).json(body))
            .await?;

        let response = ensure_success(response).await?;
        if stream {
            Ok(Relay::Lines(
                streaming::relay_lines(response.bytes_stream()).boxed(),
            ))
        } else {
            Ok(Relay::Json(read_json_verbatim(response).await?))
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> BridgeResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status, error = %e, "could not read Ollama error body");
            String::new()
        }
    };
    error!(status, body = %body, "Ollama request failed");
    Err(BridgeError::Backend { status, body })
}

/// Buffer the whole body and check that it is one JSON document, without
/// re-encoding it.
async fn read_json_verbatim(response: reqwest::Response) -> BridgeResult<Bytes> {
    let body = response.bytes().await?;
    serde_json::from_slice::<serde::de::IgnoredAny>(&body)
        .map_err(|e| BridgeError::Internal(format!("invalid JSON from Ollama: {}", e)))?;
    Ok(body)
}
