//! Layered configuration merge
//!
//! Precedence is strictly fallback < base < preset < override.

use content_engine_core::{Error, Result};

use crate::partial::{Merge, PartialConfiguration};
use crate::settings::Configuration;

/// The four configuration layers, lowest precedence first
#[derive(Debug, Clone, Default)]
pub struct MergeLayers {
    pub fallback: PartialConfiguration,
    pub base: PartialConfiguration,
    pub preset: Option<PartialConfiguration>,
    pub override_: Option<PartialConfiguration>,
}

impl MergeLayers {
    pub fn new(fallback: PartialConfiguration, base: PartialConfiguration) -> Self {
        Self {
            fallback,
            base,
            preset: None,
            override_: None,
        }
    }

    pub fn with_preset(mut self, preset: PartialConfiguration) -> Self {
        self.preset = Some(preset);
        self
    }

    pub fn with_override(mut self, overrides: PartialConfiguration) -> Self {
        self.override_ = Some(overrides);
        self
    }
}

/// Deep-merge the layers into one partial configuration
pub fn merge_layers(layers: MergeLayers) -> PartialConfiguration {
    let MergeLayers {
        fallback,
        base,
        preset,
        override_,
    } = layers;

    let mut merged = fallback;
    merged.merge(base);
    if let Some(preset) = preset {
        merged.merge(preset);
    }
    if let Some(overrides) = override_ {
        merged.merge(overrides);
    }
    merged
}

/// Merge the layers and finalize into a complete configuration
pub fn merge_config_layers(layers: MergeLayers) -> Result<Configuration> {
    merge_layers(layers).finalize().map_err(|missing| {
        Error::config(format!(
            "merged configuration is incomplete, missing: {}",
            missing.join(", ")
        ))
    })
}
