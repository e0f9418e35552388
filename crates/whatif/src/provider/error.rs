use thiserror::Error;

/// Errors raised by provider adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected provider response: {0}")]
    Parse(String),

    #[error("Provider configuration error: {0}")]
    Config(String),
}
