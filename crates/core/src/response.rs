//! Provider-normalized adapter responses

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ContentFilter,
    Other,
}

/// Response metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseMetadata {
    /// Served from a provider-side or local cache
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub finish_reason: FinishReason,
}

/// Result of one adapter execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    /// Raw string outputs, one per completion
    pub outputs: Vec<String>,
    pub usage: TokenUsage,
    pub provider: String,
    pub model: String,
    /// Estimated cost in USD
    pub cost: f64,
    /// Wall-clock duration reported by the adapter
    pub duration_ms: u64,
    /// Opaque provider payload
    #[serde(default)]
    pub raw: serde_json::Value,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl AdapterResponse {
    /// Create a response with a single output and zeroed accounting
    pub fn single(
        provider: impl Into<String>,
        model: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            outputs: vec![output.into()],
            usage: TokenUsage::default(),
            provider: provider.into(),
            model: model.into(),
            cost: 0.0,
            duration_ms: 0,
            raw: serde_json::Value::Null,
            metadata: ResponseMetadata::default(),
        }
    }
}
