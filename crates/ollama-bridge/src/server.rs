//! Actix Web HTTP server.
//!
//! Exposes an Ollama-compatible surface for the Strands SDK:
//! - `GET /` service metadata
//! - `GET /health`
//! - `POST /api/chat`
//! - `GET /api/models`, `GET /api/models/{name}`
//! - `POST /api/generate`

use crate::{
    backend::{OllamaBackend, Relay},
    config::BridgeConfig,
    error::{BridgeError, BridgeResult},
    types::{ChatRequest, HealthResponse},
};
use actix_cors::Cors;
use actix_web::{
    error::InternalError, http::header::ContentType, web, App, HttpResponse, HttpServer,
};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const SERVICE_NAME: &str = "Ollama Bridge - Strands SDK Compatible";

/// Chat histories with tool results get large; the extractor default (32 KiB)
/// is far too small.
const JSON_BODY_LIMIT: usize = 16 * 1024 * 1024;

pub struct AppState {
    pub backend: OllamaBackend,
}

impl AppState {
    pub fn new(config: &BridgeConfig) -> BridgeResult<Self> {
        Ok(Self {
            backend: OllamaBackend::new(config)?,
        })
    }
}

pub async fn serve(config: BridgeConfig) -> Result<()> {
    config.validate()?;
    let addr = config.bind_addr();
    let timeout = config.request_timeout();

    let state = web::Data::new(AppState::new(&config)?);
    startup_check(&state.backend).await;

    info!(
        addr = %addr,
        backend = %state.backend.base_url(),
        default_model = %state.backend.default_model(),
        "ollama-bridge listening"
    );

    let server_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .wrap(Cors::permissive())
            .configure(routes)
    })
    .keep_alive(timeout)
    .shutdown_timeout(timeout.as_secs())
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run()
    .await
    .context("server error")?;

    info!("ollama-bridge shutting down");
    drop(state);
    Ok(())
}

/// Register every route. Shared by [`serve`] and the integration tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(service_info))
        .route("/health", web::get().to(health_check))
        .route("/api/chat", web::post().to(chat_completion))
        .route("/api/models", web::get().to(list_models))
        .route("/api/models/{name}", web::get().to(get_model_info))
        .route("/api/generate", web::post().to(generate_completion));
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            let detail = err.to_string();
            InternalError::from_response(
                err,
                HttpResponse::UnprocessableEntity().json(json!({ "detail": detail })),
            )
            .into()
        })
}

async fn startup_check(backend: &OllamaBackend) {
    let health = backend.check_health().await;
    if health.is_healthy() {
        info!(models = health.models.len(), "Ollama is healthy");
    } else {
        warn!("Ollama service is not healthy - some endpoints may not work");
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn relay_response(relay: Relay) -> HttpResponse {
    match relay {
        Relay::Json(body) => HttpResponse::Ok()
            .content_type(ContentType::json())
            .body(body),
        Relay::Lines(lines) => HttpResponse::Ok()
            .content_type("application/x-ndjson")
            .insert_header(("cache-control", "no-cache"))
            .streaming(lines),
    }
}

fn raw_json_response(body: bytes::Bytes) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body)
}

async fn service_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "timestamp": now_timestamp(),
        "compatibility": "Strands SDK OllamaModel with tool calling support",
        "endpoints": {
            "health": "/health",
            "chat": "/api/chat",
            "models": "/api/models",
            "generate": "/api/generate"
        }
    }))
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let health = state.backend.check_health().await;
    HttpResponse::Ok().json(HealthResponse::from_backend(health, now_timestamp()))
}

async fn chat_completion(
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, BridgeError> {
    let relay = state.backend.chat(&body.into_inner()).await?;
    Ok(relay_response(relay))
}

async fn list_models(state: web::Data<AppState>) -> Result<HttpResponse, BridgeError> {
    let body = state.backend.list_models().await?;
    Ok(raw_json_response(body))
}

async fn get_model_info(
    state: web::Data<AppState>,
    name: web::Path<String>,
) -> Result<HttpResponse, BridgeError> {
    let body = state.backend.show_model(&name).await?;
    Ok(raw_json_response(body))
}

async fn generate_completion(
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, BridgeError> {
    let relay = state.backend.generate(&body).await?;
    Ok(relay_response(relay))
}
