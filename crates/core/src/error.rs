//! Error taxonomy shared by every crate in the workspace
//!
//! Errors fall into three families:
//! - **Terminal**: configuration problems, unknown adapters, rejected requests,
//!   authentication failures, filtered content and budget violations. Never retried.
//! - **Transient**: rate limits, timeouts, network and unknown provider failures.
//!   Retried by the router, then escalated to a fallback provider.
//! - **Pipeline**: malformed provider output after an otherwise successful call.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Content engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("Estimated cost {estimated:.4} exceeds ceiling {ceiling:.4}")]
    BudgetExceeded { estimated: f64, ceiling: f64 },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Failed to parse pipeline output: {0}")]
    PipelineParse(String),
}

impl Error {
    /// Serializable classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::AdapterNotFound(_) => ErrorKind::AdapterNotFound,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Error::ContentFiltered(_) => ErrorKind::ContentFiltered,
            Error::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            Error::RateLimited(_) => ErrorKind::RateLimited,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Network(_) => ErrorKind::Network,
            Error::Unknown(_) => ErrorKind::Unknown,
            Error::PipelineParse(_) => ErrorKind::PipelineParse,
        }
    }

    /// Whether the router may retry the call that produced this error
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::PipelineParse(err.to_string())
    }
}

/// Error classification carried inside task results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    AdapterNotFound,
    InvalidRequest,
    AuthenticationFailed,
    ContentFiltered,
    BudgetExceeded,
    RateLimited,
    Timeout,
    Network,
    Unknown,
    PipelineParse,
}

impl ErrorKind {
    /// Transient failures that are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::Network | ErrorKind::Unknown
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::AdapterNotFound => "adapter_not_found",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::ContentFiltered => "content_filtered",
            ErrorKind::BudgetExceeded => "budget_exceeded",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Unknown => "unknown",
            ErrorKind::PipelineParse => "pipeline_parse",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::RateLimited("slow down".into()).is_retryable());
        assert!(Error::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(Error::Network("reset".into()).is_retryable());
        assert!(Error::Unknown("?".into()).is_retryable());

        assert!(!Error::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!Error::InvalidRequest("empty prompt".into()).is_retryable());
        assert!(!Error::ContentFiltered("blocked".into()).is_retryable());
        assert!(!Error::Configuration("missing".into()).is_retryable());
        assert!(!Error::AdapterNotFound("nope".into()).is_retryable());
        assert!(!Error::PipelineParse("eof".into()).is_retryable());
        assert!(!Error::BudgetExceeded { estimated: 2.0, ceiling: 1.0 }.is_retryable());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::AuthenticationFailed).unwrap();
        assert_eq!(json, "\"authentication_failed\"");
        assert_eq!(ErrorKind::PipelineParse.to_string(), "pipeline_parse");
    }

    #[test]
    fn test_serde_error_becomes_parse_error() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::PipelineParse);
    }
}
