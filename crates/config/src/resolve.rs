//! Effective configuration for one call

use serde::Serialize;

use content_engine_core::{Error, Result};

use crate::constants::{budgets, global, validation};
use crate::merge::{merge_config_layers, MergeLayers};
use crate::partial::{
    PartialBudgets, PartialCacheTtl, PartialConfiguration, PartialContinuity, PartialEvidence,
    PartialGlobal, PartialLengthBounds, PartialValidationRules,
};
use crate::settings::{CallConfig, Configuration, GlobalSettings, LogLevel};

/// Built-in fallback layer, the lowest-precedence source of every merge
pub fn builtin_fallback() -> PartialConfiguration {
    PartialConfiguration {
        global: Some(PartialGlobal {
            provider: Some(global::DEFAULT_PROVIDER.to_string()),
            log_level: Some(LogLevel::Info),
            cache_enabled: Some(global::CACHE_ENABLED),
            cache_ttl: Some(PartialCacheTtl {
                scrape: Some(global::CACHE_TTL_SCRAPE_SECS),
                llm: Some(global::CACHE_TTL_LLM_SECS),
                image: Some(global::CACHE_TTL_IMAGE_SECS),
            }),
            log_json: Some(false),
        }),
        calls: None,
        validation: Some(PartialValidationRules {
            headline_length: Some(PartialLengthBounds {
                min: Some(validation::HEADLINE_MIN_CHARS),
                max: Some(validation::HEADLINE_MAX_CHARS),
            }),
            continuity: Some(PartialContinuity {
                min_score: Some(validation::CONTINUITY_MIN_SCORE),
            }),
            evidence: Some(PartialEvidence {
                min_citations: Some(validation::EVIDENCE_MIN_CITATIONS),
            }),
        }),
        budgets: Some(PartialBudgets {
            global_ceiling: Some(budgets::GLOBAL_CEILING),
            per_call: None,
        }),
        presets: None,
        banned_phrases: Some(Vec::new()),
    }
}

/// Options for [`resolve_effective_config`]
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Named preset from `Configuration::presets`
    pub preset: Option<String>,
    /// Run-level overrides (highest precedence)
    pub overrides: Option<PartialConfiguration>,
}

impl ResolveOptions {
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_overrides(mut self, overrides: PartialConfiguration) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// Layers that contributed to an effective configuration
#[derive(Debug, Clone, Serialize)]
pub struct LayerRefs {
    pub fallback: PartialConfiguration,
    pub base: PartialConfiguration,
    pub preset_name: Option<String>,
    pub preset: Option<PartialConfiguration>,
    pub overrides: Option<PartialConfiguration>,
}

/// Merged configuration plus the slices a single call needs
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub call_id: String,
    pub call: CallConfig,
    pub global: GlobalSettings,
    pub merged: Configuration,
    pub layers: LayerRefs,
}

/// Merge {built-in fallback, config, preset overrides, run overrides} and
/// select the slice for `call_id`
pub fn resolve_effective_config(
    config: &Configuration,
    call_id: &str,
    options: ResolveOptions,
) -> Result<EffectiveConfig> {
    let preset = match options.preset.as_deref() {
        Some(name) => {
            let preset = config
                .presets
                .get(name)
                .ok_or_else(|| Error::config(format!("unknown preset '{}'", name)))?;
            Some(preset.overrides.clone())
        }
        None => None,
    };

    let layers = LayerRefs {
        fallback: builtin_fallback(),
        base: PartialConfiguration::from(config.clone()),
        preset_name: options.preset,
        preset,
        overrides: options.overrides,
    };

    let merged = merge_config_layers(MergeLayers {
        fallback: layers.fallback.clone(),
        base: layers.base.clone(),
        preset: layers.preset.clone(),
        override_: layers.overrides.clone(),
    })?;

    let call = merged.require_call(call_id)?.clone();

    tracing::debug!(
        call_id,
        preset = ?layers.preset_name,
        provider = %call.model.provider,
        model = %call.model.model,
        "Resolved effective configuration"
    );

    Ok(EffectiveConfig {
        call_id: call_id.to_string(),
        global: merged.global.clone(),
        call,
        merged,
        layers,
    })
}
