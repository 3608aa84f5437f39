//! Typed configuration tree
//!
//! `Configuration` is the fully-populated form every consumer reads. Layered
//! sources (fallback, base, preset, override) are expressed as
//! [`PartialConfiguration`](crate::PartialConfiguration) and only become a
//! `Configuration` after merging and finalization.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::constants::{self, budgets, validation};
use crate::partial::PartialConfiguration;
use crate::validator::validate_configuration;
use crate::ConfigError;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const NAMES: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Cache TTLs in seconds, per workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtl {
    pub scrape: u64,
    pub llm: u64,
    pub image: u64,
}

/// Global settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Default provider id
    pub provider: String,
    pub log_level: LogLevel,
    pub cache_enabled: bool,
    pub cache_ttl: CacheTtl,
    /// Emit JSON-formatted logs
    #[serde(default)]
    pub log_json: bool,
}

/// Model selection for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Nucleus sampling parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Provider tried once more after retries on `provider` are exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,
}

/// Prompt for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub system: String,
    /// User prompt with `{{placeholder}}` slots
    pub user_template: String,
    /// Number of outputs the task should produce
    pub outputs_expected: u32,
}

/// Crawl-specific runtime policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlPolicy {
    pub max_pages: u32,
    pub respect_robots: bool,
}

/// Runtime policy for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimePolicy {
    pub timeout_ms: u64,
    pub max_retries: u32,
    /// Per-call cost ceiling in USD
    pub cost_ceiling: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl: Option<CrawlPolicy>,
}

impl RuntimePolicy {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration of one named call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallConfig {
    pub model: ModelSelection,
    pub prompt: PromptConfig,
    pub runtime: RuntimePolicy,
}

/// Inclusive character-length bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBounds {
    pub min: usize,
    pub max: usize,
}

impl LengthBounds {
    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

/// Continuity thresholds for multi-block copy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuityThresholds {
    pub min_score: f64,
}

/// Evidence citation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidencePolicy {
    pub min_citations: usize,
}

/// Global validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    pub headline_length: LengthBounds,
    pub continuity: ContinuityThresholds,
    pub evidence: EvidencePolicy,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            headline_length: LengthBounds {
                min: validation::HEADLINE_MIN_CHARS,
                max: validation::HEADLINE_MAX_CHARS,
            },
            continuity: ContinuityThresholds {
                min_score: validation::CONTINUITY_MIN_SCORE,
            },
            evidence: EvidencePolicy {
                min_citations: validation::EVIDENCE_MIN_CITATIONS,
            },
        }
    }
}

/// Budget ceilings in USD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budgets {
    pub global_ceiling: f64,
    #[serde(default)]
    pub per_call: BTreeMap<String, f64>,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            global_ceiling: budgets::GLOBAL_CEILING,
            per_call: BTreeMap::new(),
        }
    }
}

/// Named partial configuration applied between base and run overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub overrides: PartialConfiguration,
}

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub global: GlobalSettings,
    pub calls: BTreeMap<String, CallConfig>,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub budgets: Budgets,
    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,
    #[serde(default)]
    pub banned_phrases: Vec<String>,
}

impl Configuration {
    /// Look up a call by id
    pub fn call(&self, call_id: &str) -> Option<&CallConfig> {
        self.calls.get(call_id)
    }

    /// Look up a call by id, failing with a configuration error
    pub fn require_call(&self, call_id: &str) -> content_engine_core::Result<&CallConfig> {
        self.calls.get(call_id).ok_or_else(|| {
            content_engine_core::Error::config(format!("unknown call id '{}'", call_id))
        })
    }

    /// Effective cost ceiling for a call: the tighter of its runtime ceiling
    /// and its per-call budget, if any
    pub fn cost_ceiling(&self, call_id: &str) -> Option<f64> {
        let runtime = self.calls.get(call_id).map(|c| c.runtime.cost_ceiling);
        let budget = self.budgets.per_call.get(call_id).copied();
        match (runtime, budget) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Load a configuration file (YAML, TOML or JSON by extension) with
/// environment overrides, then validate it structurally.
///
/// Environment variables use the `CONTENT_ENGINE__` prefix and `__` as the
/// nesting separator, e.g. `CONTENT_ENGINE__GLOBAL__LOG_LEVEL=debug`.
pub fn load_configuration(path: impl AsRef<Path>) -> Result<Configuration, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let raw = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix(constants::ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize::<serde_json::Value>()?;

    let report = validate_configuration(&raw);
    match report.config {
        Some(config) if report.valid => {
            tracing::debug!(
                path = %path.display(),
                calls = config.calls.len(),
                presets = config.presets.len(),
                "Loaded configuration"
            );
            Ok(config)
        }
        _ => Err(ConfigError::Invalid(report.errors)),
    }
}
