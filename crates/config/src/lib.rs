//! Configuration management for the content engine
//!
//! Supports:
//! - YAML/TOML/JSON files with environment overrides (`CONTENT_ENGINE__` prefix)
//! - Structural validation with path-qualified issues
//! - Layered merge: built-in fallback < base < preset < run overrides
//! - Per-call effective configuration with layer provenance
//! - A source-keyed configuration cache with explicit invalidation

pub mod cache;
pub mod constants;
pub mod merge;
pub mod partial;
pub mod resolve;
pub mod settings;
pub mod validator;

pub use cache::ConfigCache;
pub use merge::{merge_config_layers, merge_layers, MergeLayers};
pub use partial::{Merge, PartialConfiguration};
pub use resolve::{builtin_fallback, resolve_effective_config, EffectiveConfig, LayerRefs, ResolveOptions};
pub use settings::{
    load_configuration, Budgets, CacheTtl, CallConfig, Configuration, ContinuityThresholds,
    CrawlPolicy, EvidencePolicy, GlobalSettings, LengthBounds, LogLevel, ModelSelection, Preset,
    PromptConfig, RuntimePolicy, ValidationRules,
};
pub use validator::{validate_config, validate_configuration, ConfigIssue, ConfigValidation};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {}", format_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for content_engine_core::Error {
    fn from(err: ConfigError) -> Self {
        content_engine_core::Error::Configuration(err.to_string())
    }
}
