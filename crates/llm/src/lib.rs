//! Provider routing for the content engine
//!
//! Features:
//! - Provider registry keyed by id
//! - Router with bounded retry, exponential backoff and single-level fallback
//! - Concurrent batch fan-out with order-preserving results
//! - HTTP adapters for OpenAI-compatible and Anthropic Messages APIs

pub mod claude;
pub mod openai;
pub mod pricing;
pub mod registry;
pub mod router;

pub use claude::{ClaudeAdapter, ClaudeConfig, ClaudeModel};
pub use openai::{OpenAiAdapter, OpenAiConfig};
pub use pricing::{price_for, ModelPrice};
pub use registry::ProviderRegistry;
pub use router::{
    BackoffPolicy, Phase, RetryMachine, RetryState, RouteOptions, Router, Workload,
};

use content_engine_core::Error;
use std::time::Duration;
use thiserror::Error;

/// HTTP adapter errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Map a transport failure, distinguishing client-side timeouts
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::Network(err.to_string())
        }
    }

    /// Map a non-success HTTP status; 408 and 504 report the configured limit
    pub fn from_status(status: u16, message: impl Into<String>, timeout: Duration) -> Self {
        let message = message.into();
        match status {
            408 | 504 => {
                tracing::warn!(status, body = %message, "Provider reported a timeout");
                LlmError::Timeout(timeout)
            }
            _ => LlmError::Http { status, message },
        }
    }
}

/// Classify an HTTP failure status into the shared taxonomy
///
/// Timeout statuses are mapped earlier by [`LlmError::from_status`].
pub fn classify_status(status: u16, message: impl Into<String>) -> Error {
    let message = format!("HTTP {}: {}", status, message.into());
    match status {
        401 | 403 => Error::AuthenticationFailed(message),
        400 | 404 | 422 => Error::InvalidRequest(message),
        429 => Error::RateLimited(message),
        500..=599 => Error::Network(message),
        _ => Error::Unknown(message),
    }
}

impl From<LlmError> for Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http { status, message } => classify_status(status, message),
            LlmError::Network(msg) => Error::Network(msg),
            LlmError::Timeout(after) => Error::Timeout(after),
            LlmError::InvalidResponse(msg) => Error::Unknown(msg),
            LlmError::ContentFiltered(msg) => Error::ContentFiltered(msg),
            LlmError::Configuration(msg) => Error::Configuration(msg),
        }
    }
}
