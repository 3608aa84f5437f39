//! OpenAI-compatible chat completions adapter
//!
//! Works with OpenAI, Azure OpenAI and local OpenAI-compatible servers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use content_engine_core::{
    AdapterResponse, Error, FinishReason, ProviderAdapter, ResponseFormat, ResponseMetadata,
    Result, SpecValidation, TaskSpec, TokenUsage,
};

use crate::pricing::price_for;
use crate::LlmError;

/// Provider id this adapter registers under
pub const PROVIDER_ID: &str = "openai";

const MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini", "gpt-4.1-nano"];

/// Configuration for OpenAI-compatible endpoints
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API endpoint (OpenAI: https://api.openai.com/v1, Azure: custom)
    pub endpoint: String,
    pub api_key: String,
    /// Model used when a spec does not name one
    pub default_model: String,
    pub timeout: Duration,
    /// Organization ID (OpenAI specific)
    pub organization: Option<String>,
    /// Azure API version (Azure specific)
    pub api_version: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            default_model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(60),
            organization: None,
            api_version: None,
        }
    }
}

impl OpenAiConfig {
    /// Config for OpenAI
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`)
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let mut config = Self::openai(api_key);
        if let Ok(endpoint) = std::env::var("OPENAI_BASE_URL") {
            config.endpoint = endpoint;
        }
        Some(config)
    }

    /// Config for Azure OpenAI
    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            default_model: deployment.into(),
            api_version: Some(api_version.into()),
            ..Default::default()
        }
    }

    /// Config for a local OpenAI-compatible server (vLLM, Ollama, etc.)
    pub fn local(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: "not-needed".to_string(),
            default_model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI-compatible adapter
pub struct OpenAiAdapter {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiAdapter {
    pub fn new(config: OpenAiConfig) -> std::result::Result<Self, LlmError> {
        if config.api_key.is_empty() && !config.endpoint.starts_with("http://localhost") {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn model_for<'a>(&'a self, spec: &'a TaskSpec) -> &'a str {
        spec.model.as_deref().unwrap_or(&self.config.default_model)
    }

    fn chat_url(&self, model: &str) -> String {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        match &self.config.api_version {
            // Azure: {endpoint}/openai/deployments/{model}/chat/completions?api-version={version}
            Some(version) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint, model, version
            ),
            None => format!("{}/chat/completions", endpoint),
        }
    }

    fn build_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::HeaderValue;

        let mut headers = reqwest::header::HeaderMap::new();

        if self.config.api_version.is_some() {
            if let Ok(val) = HeaderValue::from_str(&self.config.api_key) {
                headers.insert("api-key", val);
            }
        } else if let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)) {
            headers.insert(reqwest::header::AUTHORIZATION, val);
        }

        if let Some(ref org) = self.config.organization {
            if let Ok(val) = HeaderValue::from_str(org) {
                headers.insert("OpenAI-Organization", val);
            }
        }

        headers
    }

    fn build_request(&self, spec: &TaskSpec) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !spec.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(spec.system_prompt.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(spec.user_prompt.clone()),
        });

        ChatRequest {
            model: self.model_for(spec).to_string(),
            messages,
            max_tokens: spec.constraints.max_tokens,
            temperature: spec.constraints.temperature,
            top_p: spec.constraints.top_p,
            // json_object forces a top-level object; multi-output calls want a bare array
            response_format: match spec.response_format {
                ResponseFormat::Json if spec.outputs_expected <= 1 => Some(ChatResponseFormat {
                    kind: "json_object".to_string(),
                }),
                _ => None,
            },
        }
    }

    /// Normalize a decoded chat response
    fn parse_response(
        &self,
        body: ChatResponse,
        raw: serde_json::Value,
        fallback_model: &str,
        elapsed: Duration,
    ) -> Result<AdapterResponse> {
        if body.choices.is_empty() {
            return Err(LlmError::InvalidResponse("No choices in response".to_string()).into());
        }

        if body
            .choices
            .iter()
            .any(|c| c.finish_reason.as_deref() == Some("content_filter"))
        {
            return Err(Error::ContentFiltered(format!(
                "{} filtered the completion",
                PROVIDER_ID
            )));
        }

        let finish_reason = match body.choices[0].finish_reason.as_deref() {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(_) => FinishReason::Other,
        };

        let outputs: Vec<String> = body
            .choices
            .into_iter()
            .map(|c| c.message.content.unwrap_or_default())
            .collect();

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let model = body.model.unwrap_or_else(|| fallback_model.to_string());
        let cost = price_for(&model).map(|p| p.cost(&usage)).unwrap_or(0.0);

        Ok(AdapterResponse {
            outputs,
            usage,
            provider: PROVIDER_ID.to_string(),
            model,
            cost,
            duration_ms: elapsed.as_millis() as u64,
            raw,
            metadata: ResponseMetadata {
                cached: false,
                finish_reason,
            },
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn execute(&self, spec: &TaskSpec) -> Result<AdapterResponse> {
        let start = Instant::now();
        let request = self.build_request(spec);

        tracing::debug!(
            task_id = %spec.task_id,
            model = %request.model,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.chat_url(&request.model))
            .headers(self.build_headers())
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
        let body: ChatResponse = serde_json::from_value(raw.clone())
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        self.parse_response(body, raw, &request.model, start.elapsed())
    }

    fn estimate_cost(&self, spec: &TaskSpec) -> f64 {
        price_for(self.model_for(spec))
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
            if !(0.0..=2.0).contains(&t) {
                errors.push(format!("temperature {} outside 0..=2", t));
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
        MODELS.iter().map(|m| m.to_string()).collect()
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ChatResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
