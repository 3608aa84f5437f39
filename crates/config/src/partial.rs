//! Partial configuration layers
//!
//! Every field of a partial layer is optional. A key that is omitted and a key
//! explicitly set to `null` deserialize to the same `None`, so neither can
//! override a lower layer. `null` entries inside keyed maps (`calls`,
//! `presets`, `budgets.per_call`) are dropped as well.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::settings::{
    Budgets, CacheTtl, CallConfig, Configuration, ContinuityThresholds, CrawlPolicy,
    EvidencePolicy, GlobalSettings, LengthBounds, LogLevel, ModelSelection, Preset, PromptConfig,
    RuntimePolicy, ValidationRules,
};

/// Deep merge of a higher-precedence layer into an accumulated one
pub trait Merge {
    /// Apply `higher` on top of `self`
    fn merge(&mut self, higher: Self);
}

/// Scalars and arrays: a present value replaces the accumulated one wholesale
fn merge_value<T>(acc: &mut Option<T>, higher: Option<T>) {
    if let Some(value) = higher {
        *acc = Some(value);
    }
}

/// Nested structs recurse
fn merge_nested<T: Merge>(acc: &mut Option<T>, higher: Option<T>) {
    match (acc.as_mut(), higher) {
        (Some(existing), Some(value)) => existing.merge(value),
        (None, Some(value)) => *acc = Some(value),
        (_, None) => {}
    }
}

/// Keyed maps of structs recurse per key
fn merge_map<T: Merge>(acc: &mut Option<BTreeMap<String, T>>, higher: Option<BTreeMap<String, T>>) {
    let Some(higher) = higher else { return };
    let target = acc.get_or_insert_with(BTreeMap::new);
    for (key, value) in higher {
        match target.get_mut(&key) {
            Some(existing) => existing.merge(value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

/// Keyed maps of scalars replace per key
fn merge_entries<T>(acc: &mut Option<BTreeMap<String, T>>, higher: Option<BTreeMap<String, T>>) {
    let Some(higher) = higher else { return };
    acc.get_or_insert_with(BTreeMap::new).extend(higher);
}

/// Deserialize an optional map, discarding `null` entries
fn non_null_entries<'de, D, T>(deserializer: D) -> Result<Option<BTreeMap<String, T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let raw: Option<BTreeMap<String, Option<T>>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|entries| {
        entries
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect()
    }))
}

/// Collects missing required paths while finalizing a partial tree
struct Finalizer {
    missing: Vec<String>,
}

impl Finalizer {
    fn require<T>(&mut self, value: Option<T>, path: &str, field: &str) -> Option<T> {
        if value.is_none() {
            self.missing.push(join(path, field));
        }
        value
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

// -----------------------------------------------------------------------------
// Global
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialCacheTtl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<u64>,
}

impl Merge for PartialCacheTtl {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.scrape, higher.scrape);
        merge_value(&mut self.llm, higher.llm);
        merge_value(&mut self.image, higher.image);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialGlobal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<PartialCacheTtl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_json: Option<bool>,
}

impl Merge for PartialGlobal {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.provider, higher.provider);
        merge_value(&mut self.log_level, higher.log_level);
        merge_value(&mut self.cache_enabled, higher.cache_enabled);
        merge_nested(&mut self.cache_ttl, higher.cache_ttl);
        merge_value(&mut self.log_json, higher.log_json);
    }
}

// -----------------------------------------------------------------------------
// Calls
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialModelSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,
}

impl Merge for PartialModelSelection {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.provider, higher.provider);
        merge_value(&mut self.model, higher.model);
        merge_value(&mut self.temperature, higher.temperature);
        merge_value(&mut self.max_tokens, higher.max_tokens);
        merge_value(&mut self.top_p, higher.top_p);
        merge_value(&mut self.fallback_provider, higher.fallback_provider);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialPromptConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs_expected: Option<u32>,
}

impl Merge for PartialPromptConfig {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.system, higher.system);
        merge_value(&mut self.user_template, higher.user_template);
        merge_value(&mut self.outputs_expected, higher.outputs_expected);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialCrawlPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respect_robots: Option<bool>,
}

impl Merge for PartialCrawlPolicy {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.max_pages, higher.max_pages);
        merge_value(&mut self.respect_robots, higher.respect_robots);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialRuntimePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_ceiling: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl: Option<PartialCrawlPolicy>,
}

impl Merge for PartialRuntimePolicy {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.timeout_ms, higher.timeout_ms);
        merge_value(&mut self.max_retries, higher.max_retries);
        merge_value(&mut self.cost_ceiling, higher.cost_ceiling);
        merge_nested(&mut self.crawl, higher.crawl);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialCallConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<PartialModelSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PartialPromptConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<PartialRuntimePolicy>,
}

impl Merge for PartialCallConfig {
    fn merge(&mut self, higher: Self) {
        merge_nested(&mut self.model, higher.model);
        merge_nested(&mut self.prompt, higher.prompt);
        merge_nested(&mut self.runtime, higher.runtime);
    }
}

// -----------------------------------------------------------------------------
// Validation rules, budgets, presets
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialLengthBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

impl Merge for PartialLengthBounds {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.min, higher.min);
        merge_value(&mut self.max, higher.max);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialValidationRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline_length: Option<PartialLengthBounds>,
    /// Continuity minimum score (`continuity.min_score`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuity: Option<PartialContinuity>,
    /// Evidence policy (`evidence.min_citations`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<PartialEvidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialContinuity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
}

impl Merge for PartialContinuity {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.min_score, higher.min_score);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialEvidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_citations: Option<usize>,
}

impl Merge for PartialEvidence {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.min_citations, higher.min_citations);
    }
}

impl Merge for PartialValidationRules {
    fn merge(&mut self, higher: Self) {
        merge_nested(&mut self.headline_length, higher.headline_length);
        merge_nested(&mut self.continuity, higher.continuity);
        merge_nested(&mut self.evidence, higher.evidence);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialBudgets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_ceiling: Option<f64>,
    #[serde(
        deserialize_with = "non_null_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub per_call: Option<BTreeMap<String, f64>>,
}

impl Merge for PartialBudgets {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.global_ceiling, higher.global_ceiling);
        merge_entries(&mut self.per_call, higher.per_call);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialPreset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<PartialConfiguration>,
}

impl Merge for PartialPreset {
    fn merge(&mut self, higher: Self) {
        merge_value(&mut self.description, higher.description);
        merge_nested(&mut self.overrides, higher.overrides);
    }
}

// -----------------------------------------------------------------------------
// Root
// -----------------------------------------------------------------------------

/// Fully optional mirror of [`Configuration`] used for layering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PartialConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<PartialGlobal>,
    #[serde(
        deserialize_with = "non_null_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub calls: Option<BTreeMap<String, PartialCallConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<PartialValidationRules>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budgets: Option<PartialBudgets>,
    #[serde(
        deserialize_with = "non_null_entries",
        skip_serializing_if = "Option::is_none"
    )]
    pub presets: Option<BTreeMap<String, PartialPreset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned_phrases: Option<Vec<String>>,
}

impl Merge for PartialConfiguration {
    fn merge(&mut self, higher: Self) {
        merge_nested(&mut self.global, higher.global);
        merge_map(&mut self.calls, higher.calls);
        merge_nested(&mut self.validation, higher.validation);
        merge_nested(&mut self.budgets, higher.budgets);
        merge_map(&mut self.presets, higher.presets);
        merge_value(&mut self.banned_phrases, higher.banned_phrases);
    }
}

impl PartialConfiguration {
    /// An empty layer (merging it is a no-op)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a layer from a JSON value
    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Convert a merged layer stack into a complete configuration.
    ///
    /// `global` and every call's model/prompt/runtime fields are required;
    /// validation rules and budgets fall back to their defaults field by
    /// field. On failure, returns every missing path.
    pub fn finalize(self) -> Result<Configuration, Vec<String>> {
        let mut f = Finalizer { missing: Vec::new() };

        let global = match f.require(self.global, "", "global") {
            Some(global) => finalize_global(global, &mut f),
            None => None,
        };

        let mut calls = BTreeMap::new();
        let raw_calls = self.calls.unwrap_or_default();
        if raw_calls.is_empty() {
            f.missing.push("calls".to_string());
        }
        for (call_id, call) in raw_calls {
            if let Some(call) = finalize_call(call, &format!("calls.{}", call_id), &mut f) {
                calls.insert(call_id, call);
            }
        }

        let validation = finalize_validation(self.validation.unwrap_or_default());
        let budgets = finalize_budgets(self.budgets.unwrap_or_default());

        let presets = self
            .presets
            .unwrap_or_default()
            .into_iter()
            .map(|(name, preset)| {
                (
                    name,
                    Preset {
                        description: preset.description,
                        overrides: preset.overrides.unwrap_or_default(),
                    },
                )
            })
            .collect();

        match global {
            Some(global) if f.missing.is_empty() => Ok(Configuration {
                global,
                calls,
                validation,
                budgets,
                presets,
                banned_phrases: self.banned_phrases.unwrap_or_default(),
            }),
            _ => Err(f.missing),
        }
    }
}

fn finalize_global(global: PartialGlobal, f: &mut Finalizer) -> Option<GlobalSettings> {
    let provider = f.require(global.provider, "global", "provider");
    let log_level = f.require(global.log_level, "global", "log_level");
    let cache_enabled = f.require(global.cache_enabled, "global", "cache_enabled");
    let cache_ttl = match f.require(global.cache_ttl, "global", "cache_ttl") {
        Some(ttl) => {
            let scrape = f.require(ttl.scrape, "global.cache_ttl", "scrape");
            let llm = f.require(ttl.llm, "global.cache_ttl", "llm");
            let image = f.require(ttl.image, "global.cache_ttl", "image");
            Some(CacheTtl {
                scrape: scrape?,
                llm: llm?,
                image: image?,
            })
        }
        None => None,
    };

    Some(GlobalSettings {
        provider: provider?,
        log_level: log_level?,
        cache_enabled: cache_enabled?,
        cache_ttl: cache_ttl?,
        log_json: global.log_json.unwrap_or(false),
    })
}

fn finalize_call(call: PartialCallConfig, path: &str, f: &mut Finalizer) -> Option<CallConfig> {
    let model = f.require(call.model, path, "model").and_then(|m| {
        let p = join(path, "model");
        let provider = f.require(m.provider, &p, "provider");
        let model = f.require(m.model, &p, "model");
        let temperature = f.require(m.temperature, &p, "temperature");
        let max_tokens = f.require(m.max_tokens, &p, "max_tokens");
        Some(ModelSelection {
            provider: provider?,
            model: model?,
            temperature: temperature?,
            max_tokens: max_tokens?,
            top_p: m.top_p,
            fallback_provider: m.fallback_provider,
        })
    });

    let prompt = f.require(call.prompt, path, "prompt").and_then(|p| {
        let pp = join(path, "prompt");
        let system = f.require(p.system, &pp, "system");
        let user_template = f.require(p.user_template, &pp, "user_template");
        let outputs_expected = f.require(p.outputs_expected, &pp, "outputs_expected");
        Some(PromptConfig {
            system: system?,
            user_template: user_template?,
            outputs_expected: outputs_expected?,
        })
    });

    let runtime = f.require(call.runtime, path, "runtime").and_then(|r| {
        let rp = join(path, "runtime");
        let timeout_ms = f.require(r.timeout_ms, &rp, "timeout_ms");
        let max_retries = f.require(r.max_retries, &rp, "max_retries");
        let cost_ceiling = f.require(r.cost_ceiling, &rp, "cost_ceiling");
        let crawl = match r.crawl {
            Some(c) => {
                let cp = join(&rp, "crawl");
                let max_pages = f.require(c.max_pages, &cp, "max_pages");
                let respect_robots = f.require(c.respect_robots, &cp, "respect_robots");
                Some(CrawlPolicy {
                    max_pages: max_pages?,
                    respect_robots: respect_robots?,
                })
            }
            None => None,
        };
        Some(RuntimePolicy {
            timeout_ms: timeout_ms?,
            max_retries: max_retries?,
            cost_ceiling: cost_ceiling?,
            crawl,
        })
    });

    Some(CallConfig {
        model: model?,
        prompt: prompt?,
        runtime: runtime?,
    })
}

fn finalize_validation(rules: PartialValidationRules) -> ValidationRules {
    let defaults = ValidationRules::default();
    let headline = rules.headline_length.unwrap_or_default();
    ValidationRules {
        headline_length: LengthBounds {
            min: headline.min.unwrap_or(defaults.headline_length.min),
            max: headline.max.unwrap_or(defaults.headline_length.max),
        },
        continuity: ContinuityThresholds {
            min_score: rules
                .continuity
                .and_then(|c| c.min_score)
                .unwrap_or(defaults.continuity.min_score),
        },
        evidence: EvidencePolicy {
            min_citations: rules
                .evidence
                .and_then(|e| e.min_citations)
                .unwrap_or(defaults.evidence.min_citations),
        },
    }
}

fn finalize_budgets(budgets: PartialBudgets) -> Budgets {
    let defaults = Budgets::default();
    Budgets {
        global_ceiling: budgets.global_ceiling.unwrap_or(defaults.global_ceiling),
        per_call: budgets.per_call.unwrap_or_default(),
    }
}

// -----------------------------------------------------------------------------
// Configuration -> PartialConfiguration
// -----------------------------------------------------------------------------

impl From<GlobalSettings> for PartialGlobal {
    fn from(global: GlobalSettings) -> Self {
        Self {
            provider: Some(global.provider),
            log_level: Some(global.log_level),
            cache_enabled: Some(global.cache_enabled),
            cache_ttl: Some(PartialCacheTtl {
                scrape: Some(global.cache_ttl.scrape),
                llm: Some(global.cache_ttl.llm),
                image: Some(global.cache_ttl.image),
            }),
            log_json: Some(global.log_json),
        }
    }
}

impl From<CallConfig> for PartialCallConfig {
    fn from(call: CallConfig) -> Self {
        Self {
            model: Some(PartialModelSelection {
                provider: Some(call.model.provider),
                model: Some(call.model.model),
                temperature: Some(call.model.temperature),
                max_tokens: Some(call.model.max_tokens),
                top_p: call.model.top_p,
                fallback_provider: call.model.fallback_provider,
            }),
            prompt: Some(PartialPromptConfig {
                system: Some(call.prompt.system),
                user_template: Some(call.prompt.user_template),
                outputs_expected: Some(call.prompt.outputs_expected),
            }),
            runtime: Some(PartialRuntimePolicy {
                timeout_ms: Some(call.runtime.timeout_ms),
                max_retries: Some(call.runtime.max_retries),
                cost_ceiling: Some(call.runtime.cost_ceiling),
                crawl: call.runtime.crawl.map(|c| PartialCrawlPolicy {
                    max_pages: Some(c.max_pages),
                    respect_robots: Some(c.respect_robots),
                }),
            }),
        }
    }
}

impl From<ValidationRules> for PartialValidationRules {
    fn from(rules: ValidationRules) -> Self {
        Self {
            headline_length: Some(PartialLengthBounds {
                min: Some(rules.headline_length.min),
                max: Some(rules.headline_length.max),
            }),
            continuity: Some(PartialContinuity {
                min_score: Some(rules.continuity.min_score),
            }),
            evidence: Some(PartialEvidence {
                min_citations: Some(rules.evidence.min_citations),
            }),
        }
    }
}

impl From<Configuration> for PartialConfiguration {
    fn from(config: Configuration) -> Self {
        Self {
            global: Some(config.global.into()),
            calls: Some(
                config
                    .calls
                    .into_iter()
                    .map(|(id, call)| (id, call.into()))
                    .collect(),
            ),
            validation: Some(config.validation.into()),
            budgets: Some(PartialBudgets {
                global_ceiling: Some(config.budgets.global_ceiling),
                per_call: Some(config.budgets.per_call),
            }),
            presets: Some(
                config
                    .presets
                    .into_iter()
                    .map(|(name, preset)| {
                        (
                            name,
                            PartialPreset {
                                description: preset.description,
                                overrides: Some(preset.overrides),
                            },
                        )
                    })
                    .collect(),
            ),
            banned_phrases: Some(config.banned_phrases),
        }
    }
}
