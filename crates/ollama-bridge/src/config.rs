//! Configuration from defaults, an optional YAML file and environment variables.
//!
//! ```yaml
//! server:
//!   host: "0.0.0.0"
//!   port: 8000
//! backend:
//!   base_url: "http://localhost:11434"
//!   default_model: "llama3.1:8b"
//!   request_timeout_secs: 720
//! logging:
//!   file: "logs/app.log"
//! ```
//!
//! **Environment variables** (applied on top of the file):
//! - `HOST`, `PORT`: bind address (default: 0.0.0.0:8000)
//! - `OLLAMA_BASE_URL`: backend base URL (default: http://localhost:11434)
//! - `DEFAULT_MODEL`: model used when a request names none (default: llama3.1:8b)
//! - `REQUEST_TIMEOUT_SECS`: backend request timeout (default: 720)
//! - `LOG_FILE`: also append logs to this file

use crate::error::{BridgeError, BridgeResult};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_TIMEOUT_SECS: u64 = 720;

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub ollama_base_url: String,
    pub default_model: String,
    pub request_timeout_secs: u64,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct BridgeYamlConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    backend: BackendSection,
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct BackendSection {
    base_url: Option<String>,
    default_model: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingSection {
    file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            ollama_base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_file: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults, then the YAML file (if any), then environment variables.
    pub fn load(path: Option<&Path>) -> BridgeResult<Self> {
        let config = match path {
            Some(path) => Self::default().merge_yaml_file(path)?,
            None => Self::default(),
        };
        Ok(config.merge_env(|key| env::var(key).ok()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> BridgeResult<Self> {
        Self::default().merge_yaml_file(path.as_ref())
    }

    fn merge_yaml_file(self, path: &Path) -> BridgeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        self.merge_yaml_str(&content)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))
    }

    fn merge_yaml_str(mut self, content: &str) -> BridgeResult<Self> {
        let yaml: BridgeYamlConfig = serde_yaml_ng::from_str(content)
            .map_err(|e| BridgeError::Config(format!("failed to parse config: {}", e)))?;

        if let Some(host) = yaml.server.host {
            self.host = host;
        }
        if let Some(port) = yaml.server.port {
            self.port = port;
        }
        if let Some(url) = yaml.backend.base_url {
            self.ollama_base_url = url;
        }
        if let Some(model) = yaml.backend.default_model {
            self.default_model = model;
        }
        if let Some(secs) = yaml.backend.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if yaml.logging.file.is_some() {
            self.log_file = yaml.logging.file;
        }
        Ok(self)
    }

    /// Apply environment overrides. Unparseable numbers are ignored.
    pub fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.ollama_base_url = url;
        }
        if let Some(model) = lookup("DEFAULT_MODEL") {
            self.default_model = model;
        }
        if let Some(secs) = lookup("REQUEST_TIMEOUT_SECS").and_then(|p| p.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(file) = lookup("LOG_FILE").filter(|f| !f.is_empty()) {
            self.log_file = Some(PathBuf::from(file));
        }
        self
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(BridgeError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(BridgeError::Config("default model is empty".to_string()));
        }
        if !self.ollama_base_url.starts_with("http://")
            && !self.ollama_base_url.starts_with("https://")
        {
            return Err(BridgeError::Config(format!(
                "backend URL must be http(s): {}",
                self.ollama_base_url
            )));
        }
        Ok(())
    }

    pub fn ollama_base_url_trimmed(&self) -> &str {
        self.ollama_base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.ollama_base_url, "http://localhost:11434");
        assert_eq!(config.default_model, "llama3.1:8b");
        assert_eq!(config.request_timeout_secs, 720);
        assert!(config.log_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = BridgeConfig::default().merge_env(env_of(&[
            ("PORT", "9000"),
            ("OLLAMA_BASE_URL", "http://gpu-box:11434/"),
            ("DEFAULT_MODEL", "qwen2.5:7b"),
            ("REQUEST_TIMEOUT_SECS", "30"),
            ("LOG_FILE", "/tmp/bridge.log"),
        ]));
        assert_eq!(config.port, 9000);
        assert_eq!(config.ollama_base_url_trimmed(), "http://gpu-box:11434");
        assert_eq!(config.default_model, "qwen2.5:7b");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/bridge.log")));
    }

    #[test]
    fn test_invalid_env_numbers_are_ignored() {
        let config = BridgeConfig::default()
            .merge_env(env_of(&[("PORT", "eighty"), ("REQUEST_TIMEOUT_SECS", "-1")]));
        assert_eq!(config.port, 8000);
        assert_eq!(config.request_timeout_secs, 720);
    }

    #[test]
    fn test_yaml_then_env() {
        let config = BridgeConfig::default()
            .merge_yaml_str(
                r#"
server:
  port: 8100
backend:
  base_url: "http://10.0.0.5:11434"
  request_timeout_secs: 60
"#,
            )
            .unwrap()
            .merge_env(env_of(&[("PORT", "8200")]));

        assert_eq!(config.port, 8200);
        assert_eq!(config.ollama_base_url, "http://10.0.0.5:11434");
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.default_model, "llama3.1:8b");
    }

    #[test]
    fn test_bad_yaml_is_config_error() {
        let err = BridgeConfig::default()
            .merge_yaml_str("server: [not, a, map]")
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = BridgeConfig {
            request_timeout_secs: 0,
            ..BridgeConfig::default()
        };
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));

        let config = BridgeConfig {
            ollama_base_url: "localhost:11434".to_string(),
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
