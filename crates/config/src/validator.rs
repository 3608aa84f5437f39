//! Structural validation of raw configuration values
//!
//! Checks shape and types only; no value is coerced. Every issue carries the
//! dotted path of the offending key so all problems can be reported at once.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::settings::{Configuration, LogLevel};

/// One structural problem in a raw configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    /// Dotted path, e.g. `calls.ideas.generate.model.provider`
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of [`validate_configuration`]
#[derive(Debug, Clone)]
pub struct ConfigValidation {
    pub valid: bool,
    pub errors: Vec<ConfigIssue>,
    /// Typed configuration, present only when `valid`
    pub config: Option<Configuration>,
}

#[derive(Default)]
struct Issues(Vec<ConfigIssue>);

impl Issues {
    fn push(&mut self, path: &str, message: impl Into<String>) {
        self.0.push(ConfigIssue {
            path: path.to_string(),
            message: message.into(),
        });
    }

    /// Fetch a required object-typed child
    fn object<'a>(
        &mut self,
        parent: &'a Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<&'a Map<String, Value>> {
        let full = child(path, key);
        match parent.get(key) {
            None | Some(Value::Null) => {
                self.push(&full, "is required");
                None
            }
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                self.push(&full, format!("expected object, found {}", type_name(other)));
                None
            }
        }
    }

    /// Fetch an optional object-typed child
    fn optional_object<'a>(
        &mut self,
        parent: &'a Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<&'a Map<String, Value>> {
        match parent.get(key) {
            None | Some(Value::Null) => None,
            Some(_) => self.object(parent, path, key),
        }
    }

    fn check(
        &mut self,
        parent: &Map<String, Value>,
        path: &str,
        key: &str,
        required: bool,
        kind: Kind,
    ) {
        let full = child(path, key);
        match parent.get(key) {
            None | Some(Value::Null) => {
                if required {
                    self.push(&full, "is required");
                }
            }
            Some(value) => {
                if let Err(message) = kind.check(value) {
                    self.push(&full, message);
                }
            }
        }
    }

    fn required(&mut self, parent: &Map<String, Value>, path: &str, key: &str, kind: Kind) {
        self.check(parent, path, key, true, kind);
    }

    fn optional(&mut self, parent: &Map<String, Value>, path: &str, key: &str, kind: Kind) {
        self.check(parent, path, key, false, kind);
    }
}

/// Expected leaf type
#[derive(Clone, Copy)]
enum Kind {
    String,
    Bool,
    Number,
    /// Non-negative integer
    Count,
    /// Integer >= 1
    Positive,
    /// Number in [0, 1]
    Fraction,
    LogLevel,
    StringArray,
}

impl Kind {
    fn check(self, value: &Value) -> Result<(), String> {
        let ok = match self {
            Kind::String => value.is_string(),
            Kind::Bool => value.is_boolean(),
            Kind::Number => value.is_number(),
            Kind::Count => value.is_u64(),
            Kind::Positive => value.as_u64().map(|n| n >= 1).unwrap_or(false),
            Kind::Fraction => value
                .as_f64()
                .map(|n| (0.0..=1.0).contains(&n))
                .unwrap_or(false),
            Kind::LogLevel => value
                .as_str()
                .map(|s| LogLevel::NAMES.contains(&s))
                .unwrap_or(false),
            Kind::StringArray => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        };
        if ok {
            return Ok(());
        }
        Err(match self {
            Kind::String => format!("expected string, found {}", type_name(value)),
            Kind::Bool => format!("expected boolean, found {}", type_name(value)),
            Kind::Number => format!("expected number, found {}", type_name(value)),
            Kind::Count => "expected non-negative integer".to_string(),
            Kind::Positive => "expected integer >= 1".to_string(),
            Kind::Fraction => "expected number between 0 and 1".to_string(),
            Kind::LogLevel => format!("expected one of {}", LogLevel::NAMES.join(", ")),
            Kind::StringArray => "expected array of strings".to_string(),
        })
    }
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a raw configuration value and, if it is well-formed, return the
/// typed tree
pub fn validate_configuration(raw: &Value) -> ConfigValidation {
    let mut issues = Issues::default();

    let Some(root) = raw.as_object() else {
        issues.push("(root)", format!("expected object, found {}", type_name(raw)));
        return finish(raw, issues);
    };

    if let Some(global) = issues.object(root, "", "global") {
        check_global(global, &mut issues);
    }

    match root.get("calls") {
        None | Some(Value::Null) => issues.push("calls", "is required"),
        Some(Value::Object(calls)) if calls.is_empty() => {
            issues.push("calls", "at least one call must be defined")
        }
        Some(Value::Object(calls)) => {
            for (call_id, call) in calls {
                let path = child("calls", call_id);
                match call.as_object() {
                    Some(call) => check_call(call, &path, &mut issues),
                    None => issues.push(&path, "expected object"),
                }
            }
        }
        Some(other) => issues.push("calls", format!("expected object, found {}", type_name(other))),
    }

    if let Some(validation) = issues.optional_object(root, "", "validation") {
        check_validation(validation, &mut issues);
    }

    if let Some(budgets) = issues.optional_object(root, "", "budgets") {
        issues.optional(budgets, "budgets", "global_ceiling", Kind::Number);
        if let Some(per_call) = issues.optional_object(budgets, "budgets", "per_call") {
            for key in per_call.keys() {
                issues.optional(per_call, "budgets.per_call", key, Kind::Number);
            }
        }
    }

    if let Some(presets) = issues.optional_object(root, "", "presets") {
        for (name, preset) in presets {
            let path = child("presets", name);
            match preset.as_object() {
                Some(preset) => {
                    issues.optional(preset, &path, "description", Kind::String);
                    issues.object(preset, &path, "overrides");
                }
                None => issues.push(&path, "expected object"),
            }
        }
    }

    issues.optional(root, "", "banned_phrases", Kind::StringArray);

    finish(raw, issues)
}

fn check_global(global: &Map<String, Value>, issues: &mut Issues) {
    issues.required(global, "global", "provider", Kind::String);
    issues.required(global, "global", "log_level", Kind::LogLevel);
    issues.required(global, "global", "cache_enabled", Kind::Bool);
    issues.optional(global, "global", "log_json", Kind::Bool);
    if let Some(ttl) = issues.object(global, "global", "cache_ttl") {
        for key in ["scrape", "llm", "image"] {
            issues.required(ttl, "global.cache_ttl", key, Kind::Count);
        }
    }
}

fn check_call(call: &Map<String, Value>, path: &str, issues: &mut Issues) {
    if let Some(model) = issues.object(call, path, "model") {
        let p = child(path, "model");
        issues.required(model, &p, "provider", Kind::String);
        issues.required(model, &p, "model", Kind::String);
        issues.required(model, &p, "temperature", Kind::Number);
        issues.required(model, &p, "max_tokens", Kind::Positive);
        issues.optional(model, &p, "top_p", Kind::Fraction);
        issues.optional(model, &p, "fallback_provider", Kind::String);
    }

    if let Some(prompt) = issues.object(call, path, "prompt") {
        let p = child(path, "prompt");
        issues.required(prompt, &p, "system", Kind::String);
        issues.required(prompt, &p, "user_template", Kind::String);
        issues.required(prompt, &p, "outputs_expected", Kind::Positive);
    }

    if let Some(runtime) = issues.object(call, path, "runtime") {
        let p = child(path, "runtime");
        issues.required(runtime, &p, "timeout_ms", Kind::Count);
        issues.required(runtime, &p, "max_retries", Kind::Count);
        issues.required(runtime, &p, "cost_ceiling", Kind::Number);
        if let Some(crawl) = issues.optional_object(runtime, &p, "crawl") {
            let cp = child(&p, "crawl");
            issues.required(crawl, &cp, "max_pages", Kind::Count);
            issues.required(crawl, &cp, "respect_robots", Kind::Bool);
        }
    }
}

fn check_validation(validation: &Map<String, Value>, issues: &mut Issues) {
    if let Some(bounds) = issues.optional_object(validation, "validation", "headline_length") {
        issues.optional(bounds, "validation.headline_length", "min", Kind::Count);
        issues.optional(bounds, "validation.headline_length", "max", Kind::Count);
        if let (Some(min), Some(max)) = (
            bounds.get("min").and_then(Value::as_u64),
            bounds.get("max").and_then(Value::as_u64),
        ) {
            if min > max {
                issues.push("validation.headline_length", "min must not exceed max");
            }
        }
    }
    if let Some(continuity) = issues.optional_object(validation, "validation", "continuity") {
        issues.optional(continuity, "validation.continuity", "min_score", Kind::Fraction);
    }
    if let Some(evidence) = issues.optional_object(validation, "validation", "evidence") {
        issues.optional(evidence, "validation.evidence", "min_citations", Kind::Count);
    }
}

fn finish(raw: &Value, issues: Issues) -> ConfigValidation {
    let mut errors = issues.0;
    if !errors.is_empty() {
        return ConfigValidation {
            valid: false,
            errors,
            config: None,
        };
    }

    match serde_json::from_value::<Configuration>(raw.clone()) {
        Ok(config) => ConfigValidation {
            valid: true,
            errors,
            config: Some(config),
        },
        Err(e) => {
            errors.push(ConfigIssue {
                path: "(root)".to_string(),
                message: e.to_string(),
            });
            ConfigValidation {
                valid: false,
                errors,
                config: None,
            }
        }
    }
}

/// Alias of [`validate_configuration`]
pub fn validate_config(raw: &Value) -> ConfigValidation {
    validate_configuration(raw)
}
