//! Claude adapter
//!
//! Implements the Anthropic Messages API. Claude has no JSON response mode, so
//! JSON specs get an explicit instruction appended to the system prompt.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use content_engine_core::{
    AdapterResponse, Error, FinishReason, ProviderAdapter, ResponseFormat, ResponseMetadata,
    Result, SpecValidation, TaskSpec, TokenUsage,
};

use crate::pricing::{price_for, DEFAULT_COMPLETION_TOKENS};
use crate::LlmError;

/// Provider id this adapter registers under
pub const PROVIDER_ID: &str = "claude";

const API_VERSION: &str = "2023-06-01";

const JSON_INSTRUCTION: &str = "Respond with a single valid JSON value and nothing else.";

/// Claude model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaudeModel {
    /// Most capable, best for long-form copy
    Opus4_5,
    /// Fast and capable
    #[default]
    Sonnet4,
    /// Fastest, good for short structured outputs
    Haiku3_5,
}

impl ClaudeModel {
    pub const ALL: [ClaudeModel; 3] = [ClaudeModel::Opus4_5, ClaudeModel::Sonnet4, ClaudeModel::Haiku3_5];

    pub fn model_id(&self) -> &'static str {
        match self {
            ClaudeModel::Opus4_5 => "claude-opus-4-5-20251101",
            ClaudeModel::Sonnet4 => "claude-sonnet-4-20250514",
            ClaudeModel::Haiku3_5 => "claude-3-5-haiku-20241022",
        }
    }

    /// Resolve a short alias or full model id
    pub fn from_alias(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "opus" | "opus-4.5" | "claude-opus-4-5-20251101" => Some(ClaudeModel::Opus4_5),
            "sonnet" | "sonnet-4" | "claude-sonnet-4-20250514" => Some(ClaudeModel::Sonnet4),
            "haiku" | "haiku-3.5" | "claude-3-5-haiku-20241022" => Some(ClaudeModel::Haiku3_5),
            _ => None,
        }
    }
}

/// Configuration for the Claude adapter
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    /// Model used when a spec does not name one
    pub default_model: ClaudeModel,
    pub timeout: Duration,
    /// API endpoint (for testing or proxy)
    pub endpoint: String,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            default_model: ClaudeModel::default(),
            timeout: Duration::from_secs(60),
            endpoint: "https://api.anthropic.com".to_string(),
        }
    }
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read `ANTHROPIC_API_KEY`
    pub fn from_env() -> Option<Self> {
        std::env::var("ANTHROPIC_API_KEY").ok().map(Self::new)
    }

    pub fn with_model(mut self, model: ClaudeModel) -> Self {
        self.default_model = model;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Claude Messages API adapter
pub struct ClaudeAdapter {
    config: ClaudeConfig,
    client: Client,
}

impl ClaudeAdapter {
    pub fn new(config: ClaudeConfig) -> std::result::Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Spec model resolved through aliases; unknown ids pass through unchanged
    fn model_for(&self, spec: &TaskSpec) -> String {
        match spec.model.as_deref() {
            Some(name) => ClaudeModel::from_alias(name)
                .map(|m| m.model_id().to_string())
                .unwrap_or_else(|| name.to_string()),
            None => self.config.default_model.model_id().to_string(),
        }
    }

    fn build_request(&self, spec: &TaskSpec) -> MessagesRequest {
        let system = match spec.response_format {
            ResponseFormat::Json if spec.system_prompt.is_empty() => JSON_INSTRUCTION.to_string(),
            ResponseFormat::Json => format!("{}\n\n{}", spec.system_prompt, JSON_INSTRUCTION),
            ResponseFormat::Text => spec.system_prompt.clone(),
        };

        MessagesRequest {
            model: self.model_for(spec),
            max_tokens: spec.constraints.max_tokens.unwrap_or(DEFAULT_COMPLETION_TOKENS),
            messages: vec![MessagesMessage {
                role: "user".to_string(),
                content: spec.user_prompt.clone(),
            }],
            system: (!system.is_empty()).then_some(system),
            temperature: spec.constraints.temperature,
            top_p: spec.constraints.top_p,
        }
    }

    fn parse_response(
        &self,
        body: MessagesResponse,
        raw: serde_json::Value,
        elapsed: Duration,
    ) -> Result<AdapterResponse> {
        let finish_reason = match body.stop_reason {
            Some(StopReason::Refusal) => {
                return Err(Error::ContentFiltered(format!(
                    "{} refused the request",
                    PROVIDER_ID
                )))
            }
            Some(StopReason::EndTurn) | Some(StopReason::StopSequence) | None => FinishReason::Stop,
            Some(StopReason::MaxTokens) => FinishReason::Length,
            Some(StopReason::Other) => FinishReason::Other,
        };

        let text: String = body
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        if text.is_empty() {
            return Err(LlmError::InvalidResponse("No text content in response".to_string()).into());
        }

        let usage = TokenUsage::new(body.usage.input_tokens, body.usage.output_tokens);
        let cost = price_for(&body.model).map(|p| p.cost(&usage)).unwrap_or(0.0);

        Ok(AdapterResponse {
            outputs: vec![text],
            usage,
            provider: PROVIDER_ID.to_string(),
            model: body.model,
            cost,
            duration_ms: elapsed.as_millis() as u64,
            raw,
            metadata: ResponseMetadata {
                cached: body.usage.cache_read_input_tokens.unwrap_or(0) > 0,
                finish_reason,
            },
        })
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn execute(&self, spec: &TaskSpec) -> Result<AdapterResponse> {
        let start = Instant::now();
        let request = self.build_request(spec);

        tracing::debug!(
            task_id = %spec.task_id,
            model = %request.model,
            "Sending messages request"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/')))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(
                LlmError::from_status(status.as_u16(), error_text, self.config.timeout).into(),
            );
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let body: MessagesResponse = serde_json::from_value(raw.clone())
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        self.parse_response(body, raw, start.elapsed())
    }

    fn estimate_cost(&self, spec: &TaskSpec) -> f64 {
        price_for(&self.model_for(spec))
            .map(|price| price.estimate(spec))
            .unwrap_or(0.0)
    }

    fn validate_spec(&self, spec: &TaskSpec) -> SpecValidation {
        let mut errors = Vec::new();
        if spec.user_prompt.trim().is_empty() {
            errors.push("user prompt is empty".to_string());
        }
        if spec.constraints.max_tokens == Some(0) {
            errors.push("max_tokens must be positive".to_string());
        }
        if let Some(t) = spec.constraints.temperature {
            if !(0.0..=1.0).contains(&t) {
                errors.push(format!("temperature {} outside 0..=1", t));
            }
        }
        if let Some(p) = spec.constraints.top_p {
            if !(0.0..=1.0).contains(&p) {
                errors.push(format!("top_p {} outside 0..=1", p));
            }
        }
        SpecValidation::from_errors(errors)
    }

    fn available_models(&self) -> Vec<String> {
        ClaudeModel::ALL
            .iter()
            .map(|m| m.model_id().to_string())
            .collect()
    }
}

// Claude API types
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<MessagesMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct MessagesMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<StopReason>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    Refusal,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: Option<u32>,
}
