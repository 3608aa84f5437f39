//! Provider adapter trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AdapterResponse, Result, TaskSpec};

/// Outcome of an adapter's pre-flight check on a spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpecValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl SpecValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Provider adapter interface
///
/// Implementations translate a neutral [`TaskSpec`] into one concrete API
/// call and normalize the provider's answer. Errors must be classified into
/// the shared taxonomy so the router can decide between retry, fallback and
/// immediate failure.
///
/// # Example
///
/// ```ignore
/// let adapter: Arc<dyn ProviderAdapter> = Arc::new(OpenAiAdapter::new(config)?);
/// if adapter.validate_spec(&spec).valid {
///     let response = adapter.execute(&spec).await?;
/// }
/// ```
#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// Registry key for this adapter (e.g. "openai")
    fn provider_id(&self) -> &str;

    /// Execute the spec against the provider
    async fn execute(&self, spec: &TaskSpec) -> Result<AdapterResponse>;

    /// Estimated cost in USD, before execution
    fn estimate_cost(&self, spec: &TaskSpec) -> f64;

    /// Pre-flight check; a failure means no network attempt is made
    fn validate_spec(&self, spec: &TaskSpec) -> SpecValidation;

    /// Models this adapter can serve
    fn available_models(&self) -> Vec<String>;
}
