//! Per-model price table used for cost estimates

use content_engine_core::{TaskSpec, TokenUsage};

/// Default completion allowance when a spec carries no `max_tokens`
pub const DEFAULT_COMPLETION_TOKENS: u32 = 1024;

/// USD per 1K tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Cost of reported usage
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt_tokens as f64 * self.input_per_1k
            + usage.completion_tokens as f64 * self.output_per_1k)
            / 1000.0
    }

    /// Upper-bound estimate before execution: the prompt plus the full
    /// completion allowance
    pub fn estimate(&self, spec: &TaskSpec) -> f64 {
        let completion = spec
            .constraints
            .max_tokens
            .unwrap_or(DEFAULT_COMPLETION_TOKENS);
        self.cost(&TokenUsage::new(spec.estimated_prompt_tokens(), completion))
    }
}

/// Prefix-matched price table; longest prefix first
const PRICES: &[(&str, ModelPrice)] = &[
    ("gpt-4o-mini", ModelPrice::new(0.000_15, 0.000_6)),
    ("gpt-4o", ModelPrice::new(0.002_5, 0.01)),
    ("gpt-4.1-nano", ModelPrice::new(0.000_1, 0.000_4)),
    ("gpt-4.1-mini", ModelPrice::new(0.000_4, 0.001_6)),
    ("gpt-4.1", ModelPrice::new(0.002, 0.008)),
    ("claude-opus-4", ModelPrice::new(0.005, 0.025)),
    ("claude-sonnet-4", ModelPrice::new(0.003, 0.015)),
    ("claude-3-5-haiku", ModelPrice::new(0.000_8, 0.004)),
];

/// Look up the price for a model id
pub fn price_for(model: &str) -> Option<ModelPrice> {
    PRICES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, price)| *price)
}
