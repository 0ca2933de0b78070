//! Bridge error types and their HTTP mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Request timeout - the model is taking too long to respond")]
    Timeout,

    #[error("Unable to connect to Ollama service")]
    Unavailable,

    #[error("Ollama request failed: {body}")]
    Backend { status: u16, body: String },

    #[error("Model '{model}' not found")]
    NotFound { model: String },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Collapse into a 500, keeping `NotFound` and the original message.
    pub fn into_internal(self) -> Self {
        match self {
            Self::NotFound { .. } | Self::Internal(_) => self,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl ResponseError for BridgeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            // A backend status that is not a valid HTTP code is still a bad gateway.
            Self::Backend { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}
