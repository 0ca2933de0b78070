//! Demo agent error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no final answer after {0} tool rounds")]
    TooManyToolRounds(usize),
}
