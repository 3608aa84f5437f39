//! Task spec builders
//!
//! One builder per logical task. Each looks up its call by fixed id, renders
//! the user template with canonical JSON payloads and copies sampling
//! constraints from the call's model section. Builders are pure.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use content_engine_config::{constants::task_ids, Configuration};
use content_engine_core::{ResponseFormat, Result, SamplingConstraints, SpecMetadata, TaskSpec};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Length of the content fingerprint in hex characters
pub const FINGERPRINT_LEN: usize = 16;

/// Caller-supplied metadata
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub run_id: Option<String>,
    /// Overrides the kernel's own `domain` field
    pub domain: Option<String>,
}

impl BuildOptions {
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Compact JSON with sorted object keys
pub fn canonical_json(value: &Value) -> String {
    // serde_json's default map is ordered by key
    value.to_string()
}

/// First [`FINGERPRINT_LEN`] hex chars of SHA-256 over the canonical payload
pub fn content_fingerprint(value: &Value) -> String {
    let digest = Sha256::digest(canonical_json(value).as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Replace `{{name}}` placeholders; unknown names are left verbatim
pub fn render_template(template: &str, values: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn build_spec(
    config: &Configuration,
    task_id: &str,
    kernel: &Value,
    payloads: &[(&'static str, &Value)],
    opts: &BuildOptions,
) -> Result<TaskSpec> {
    let call = config.require_call(task_id)?;

    let domain = opts
        .domain
        .clone()
        .or_else(|| kernel.get("domain").and_then(Value::as_str).map(str::to_string));

    let mut values: HashMap<&str, String> = HashMap::new();
    values.insert("kernel", canonical_json(kernel));
    values.insert("outputs_expected", call.prompt.outputs_expected.to_string());
    if let Some(domain) = &domain {
        values.insert("domain", domain.clone());
    }
    for (name, payload) in payloads {
        values.insert(name, canonical_json(payload));
    }

    let spec = TaskSpec {
        task_id: task_id.to_string(),
        model: Some(call.model.model.clone()),
        system_prompt: call.prompt.system.clone(),
        user_prompt: render_template(&call.prompt.user_template, &values),
        response_format: ResponseFormat::Json,
        schema: None,
        outputs_expected: call.prompt.outputs_expected,
        constraints: SamplingConstraints {
            max_tokens: Some(call.model.max_tokens),
            temperature: Some(call.model.temperature),
            top_p: call.model.top_p,
        },
        metadata: SpecMetadata {
            run_id: opts.run_id.clone(),
            domain,
            content_fingerprint: Some(content_fingerprint(kernel)),
        },
    };

    tracing::debug!(
        task_id,
        model = %call.model.model,
        fingerprint = ?spec.metadata.content_fingerprint,
        "Built task spec"
    );

    Ok(spec)
}

/// Spec for `ideas.generate`
pub fn build_ideas_spec(config: &Configuration, kernel: &Value, opts: &BuildOptions) -> Result<TaskSpec> {
    build_spec(config, task_ids::IDEAS, kernel, &[], opts)
}

/// Spec for `copy.generate` from a selected idea
pub fn build_copy_spec(
    config: &Configuration,
    kernel: &Value,
    idea: &Value,
    opts: &BuildOptions,
) -> Result<TaskSpec> {
    build_spec(config, task_ids::COPY, kernel, &[("idea", idea)], opts)
}

/// Spec for `image.brief` from a selected idea
pub fn build_image_brief_spec(
    config: &Configuration,
    kernel: &Value,
    idea: &Value,
    opts: &BuildOptions,
) -> Result<TaskSpec> {
    build_spec(config, task_ids::IMAGE_BRIEF, kernel, &[("idea", idea)], opts)
}

/// Spec for `review.summary` of a finished artifact
pub fn build_review_spec(
    config: &Configuration,
    kernel: &Value,
    subject: &Value,
    opts: &BuildOptions,
) -> Result<TaskSpec> {
    build_spec(config, task_ids::REVIEW_SUMMARY, kernel, &[("subject", subject)], opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_engine_core::Error;
    use serde_json::json;

    fn config() -> Configuration {
        let call = |template: &str, outputs: u32| {
            json!({
                "model": { "provider": "openai", "model": "gpt-4o", "temperature": 0.8, "max_tokens": 4096, "top_p": 0.95 },
                "prompt": { "system": "You are a strategist.", "user_template": template, "outputs_expected": outputs },
                "runtime": { "timeout_ms": 60000, "max_retries": 2, "cost_ceiling": 0.5 }
            })
        };
        serde_json::from_value(json!({
            "global": {
                "provider": "openai",
                "log_level": "info",
                "cache_enabled": true,
                "cache_ttl": { "scrape": 1, "llm": 1, "image": 1 }
            },
            "calls": {
                "ideas.generate": call("Give {{outputs_expected}} ideas for {{domain}}: {{kernel}} {{unknown}}", 20),
                "copy.generate": call("Kernel {{kernel}} Idea {{ idea }}", 1),
                "review.summary": call("Review {{subject}}", 1)
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_ideas_spec() {
        let kernel = json!({ "domain": "acme.io", "brand": { "name": "Acme", "tone": "dry" } });
        let spec = build_ideas_spec(&config(), &kernel, &BuildOptions::default().with_run_id("r1")).unwrap();

        assert_eq!(spec.task_id, "ideas.generate");
        assert_eq!(spec.model.as_deref(), Some("gpt-4o"));
        assert_eq!(spec.response_format, ResponseFormat::Json);
        assert_eq!(
            spec.user_prompt,
            r#"Give 20 ideas for acme.io: {"brand":{"name":"Acme","tone":"dry"},"domain":"acme.io"} {{unknown}}"#
        );
        assert_eq!(spec.outputs_expected, 20);
        assert_eq!(spec.constraints.max_tokens, Some(4096));
        assert_eq!(spec.constraints.top_p, Some(0.95));
        assert_eq!(spec.metadata.run_id.as_deref(), Some("r1"));
        assert_eq!(spec.metadata.domain.as_deref(), Some("acme.io"));
        assert_eq!(spec.metadata.content_fingerprint.as_ref().unwrap().len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_copy_spec_substitutes_idea() {
        let idea = json!({ "headline": "Ship faster" });
        let spec = build_copy_spec(
            &config(),
            &json!({ "k": 1 }),
            &idea,
            &BuildOptions::default().with_domain("example.com"),
        )
        .unwrap();
        assert_eq!(spec.user_prompt, r#"Kernel {"k":1} Idea {"headline":"Ship faster"}"#);
        assert_eq!(spec.metadata.domain.as_deref(), Some("example.com"));
        assert!(spec.metadata.run_id.is_none());
        assert_eq!(spec.outputs_expected, 1);
    }

    #[test]
    fn test_review_spec_substitutes_subject() {
        let spec = build_review_spec(&config(), &json!({}), &json!(["a"]), &BuildOptions::default()).unwrap();
        assert_eq!(spec.user_prompt, r#"Review ["a"]"#);
    }

    #[test]
    fn test_missing_call_fails_fast() {
        let err = build_image_brief_spec(&config(), &json!({}), &json!({}), &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"c":2,"d":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"d":3,"c":2},"a":1}"#).unwrap();
        assert_eq!(content_fingerprint(&a), content_fingerprint(&b));
        assert_ne!(content_fingerprint(&a), content_fingerprint(&json!({ "a": 2 })));
    }

    #[test]
    fn test_render_template_leaves_unknown() {
        let mut values = HashMap::new();
        values.insert("x", "1".to_string());
        assert_eq!(render_template("{{x}}-{{y}}-{{ x }}", &values), "1-{{y}}-1");
    }
}
