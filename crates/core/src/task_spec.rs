//! Provider-neutral task specification
//!
//! A `TaskSpec` describes one model invocation without committing to any
//! provider's wire format. Adapters translate it into concrete API calls.

use serde::{Deserialize, Serialize};

/// Response format requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Structured JSON output (used by every pipeline task)
    #[default]
    Json,
    /// Free-form text
    Text,
}

/// Sampling constraints copied from the call's model section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SamplingConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// Metadata attached to a spec for audit and tracing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpecMetadata {
    /// Caller-supplied run id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Domain the kernel was produced for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Fingerprint of the canonical kernel payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_fingerprint: Option<String>,
}

/// Neutral description of a single model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Call id this spec was built for (e.g. "ideas.generate")
    pub task_id: String,
    /// Model name from the call config; adapters fall back to their default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Optional JSON schema the output should follow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Number of logical outputs the call asks for
    #[serde(default = "default_outputs_expected")]
    pub outputs_expected: u32,
    #[serde(default)]
    pub constraints: SamplingConstraints,
    #[serde(default)]
    pub metadata: SpecMetadata,
}

fn default_outputs_expected() -> u32 {
    1
}

impl TaskSpec {
    /// Create a JSON-format spec with empty constraints and metadata
    pub fn new(
        task_id: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            model: None,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            response_format: ResponseFormat::Json,
            schema: None,
            outputs_expected: 1,
            constraints: SamplingConstraints::default(),
            metadata: SpecMetadata::default(),
        }
    }

    /// Set model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set response format
    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn with_outputs_expected(mut self, outputs_expected: u32) -> Self {
        self.outputs_expected = outputs_expected;
        self
    }

    /// Set run id
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.metadata.run_id = Some(run_id.into());
        self
    }

    /// Rough prompt size in tokens (about four characters per token)
    pub fn estimated_prompt_tokens(&self) -> u32 {
        let chars = self.system_prompt.chars().count() + self.user_prompt.chars().count();
        (chars / 4).max(1) as u32
    }
}
