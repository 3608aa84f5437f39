//! Centralized constants for the content engine
//!
//! Single source of truth for call ids and the values baked into the
//! built-in fallback layer.

/// Call ids of the tasks the pipeline knows how to build and validate
pub mod task_ids {
    pub const IDEAS: &str = "ideas.generate";
    pub const COPY: &str = "copy.generate";
    pub const IMAGE_BRIEF: &str = "image.brief";
    pub const REVIEW_SUMMARY: &str = "review.summary";
}

/// Built-in global defaults
pub mod global {
    pub const DEFAULT_PROVIDER: &str = "openai";
    pub const DEFAULT_LOG_LEVEL: &str = "info";
    pub const CACHE_ENABLED: bool = true;

    /// Cache TTLs in seconds
    pub const CACHE_TTL_SCRAPE_SECS: u64 = 3_600;
    pub const CACHE_TTL_LLM_SECS: u64 = 86_400;
    pub const CACHE_TTL_IMAGE_SECS: u64 = 604_800;
}

/// Built-in validation rules
pub mod validation {
    /// Headline length bounds (characters)
    pub const HEADLINE_MIN_CHARS: usize = 10;
    pub const HEADLINE_MAX_CHARS: usize = 120;

    /// Copy blocks scoring below this continuity score are flagged
    pub const CONTINUITY_MIN_SCORE: f64 = 0.6;

    /// Fewer evidence citations than this is a warning
    pub const EVIDENCE_MIN_CITATIONS: usize = 1;
}

/// Built-in budget ceilings (USD)
pub mod budgets {
    pub const GLOBAL_CEILING: f64 = 50.0;
}

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CONTENT_ENGINE";
