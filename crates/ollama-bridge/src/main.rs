//! `ollama-bridge` binary entrypoint.

use anyhow::Result;
use clap::Parser;
use ollama_bridge::{logging::init_tracing, serve, BridgeConfig};
use std::path::PathBuf;

/// Proxy Strands SDK chat requests to a local Ollama server
#[derive(Parser, Debug)]
#[command(name = "ollama-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "OLLAMA_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Ollama base URL (e.g., http://localhost:11434)
    #[arg(long)]
    backend_url: Option<String>,

    /// Model used when a request does not name one
    #[arg(short, long)]
    model: Option<String>,

    /// Backend request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Also append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn apply(self, mut config: BridgeConfig) -> BridgeConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(url) = self.backend_url {
            config.ollama_base_url = url;
        }
        if let Some(model) = self.model {
            config.default_model = model;
        }
        if let Some(secs) = self.timeout {
            config.request_timeout_secs = secs;
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file;
        }
        config
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BridgeConfig::load(cli.config.as_deref())?;
    let config = cli.apply(config);

    init_tracing(config.log_file.as_deref())?;
    tracing::info!(
        backend = %config.ollama_base_url,
        default_model = %config.default_model,
        timeout_secs = config.request_timeout_secs,
        "ollama-bridge starting up"
    );

    serve(config).await
}
