//! File loading and end-to-end resolution

use content_engine_config::{
    load_configuration, resolve_effective_config, ConfigCache, ConfigError, LogLevel,
    PartialConfiguration, ResolveOptions,
};
use std::io::Write;
use tempfile::NamedTempFile;

const BASE_YAML: &str = r#"
global:
  provider: openai
  log_level: warn
  cache_enabled: true
  cache_ttl:
    scrape: 3600
    llm: 86400
    image: 604800
calls:
  ideas.generate:
    model:
      provider: openai
      model: gpt-4o
      temperature: 0.8
      max_tokens: 4096
      fallback_provider: claude
    prompt:
      system: You generate content ideas.
      user_template: "Kernel: {{kernel}}. Produce {{outputs_expected}} ideas."
      outputs_expected: 20
    runtime:
      timeout_ms: 60000
      max_retries: 2
      cost_ceiling: 0.5
budgets:
  global_ceiling: 25.0
  per_call:
    ideas.generate: 0.25
presets:
  draft:
    description: Cheap drafting
    overrides:
      calls:
        ideas.generate:
          model:
            model: gpt-4o-mini
banned_phrases:
  - game-changer
  - unlock your potential
"#;

fn write_temp(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_yaml_configuration() {
    let file = write_temp(BASE_YAML, ".yaml");
    let config = load_configuration(file.path()).unwrap();

    assert_eq!(config.global.log_level, LogLevel::Warn);
    let call = config.call("ideas.generate").unwrap();
    assert_eq!(call.model.fallback_provider.as_deref(), Some("claude"));
    assert_eq!(call.prompt.outputs_expected, 20);
    assert_eq!(config.cost_ceiling("ideas.generate"), Some(0.25));
    assert_eq!(config.banned_phrases.len(), 2);
}

#[test]
fn test_load_missing_file() {
    let err = load_configuration("/nonexistent/content-engine.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound(_)));
}

#[test]
fn test_load_structurally_invalid_file() {
    let file = write_temp(
        r#"
global:
  provider: openai
  log_level: loud
calls: {}
"#,
        ".yaml",
    );

    match load_configuration(file.path()).unwrap_err() {
        ConfigError::Invalid(issues) => {
            let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
            assert!(paths.contains(&"global.log_level"));
            assert!(paths.contains(&"global.cache_enabled"));
            assert!(paths.contains(&"calls"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_cached_load_then_resolve_with_preset() {
    let file = write_temp(BASE_YAML, ".yaml");
    let key = file.path().display().to_string();
    let cache = ConfigCache::new();

    let config = cache
        .get_or_load(&key, || load_configuration(file.path()))
        .unwrap();
    assert_eq!(cache.len(), 1);

    let overrides = PartialConfiguration::from_json(serde_json::json!({
        "calls": { "ideas.generate": { "runtime": { "max_retries": 0 } } }
    }))
    .unwrap();

    let effective = resolve_effective_config(
        &config,
        "ideas.generate",
        ResolveOptions::default()
            .with_preset("draft")
            .with_overrides(overrides),
    )
    .unwrap();

    assert_eq!(effective.call.model.model, "gpt-4o-mini");
    assert_eq!(effective.call.model.provider, "openai");
    assert_eq!(effective.call.runtime.max_retries, 0);
    assert_eq!(effective.merged.budgets.global_ceiling, 25.0);
}

#[test]
fn test_bundled_configuration_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/content-engine.yaml");
    let config = load_configuration(path).unwrap();

    for call_id in [
        "ideas.generate",
        "copy.generate",
        "image.brief",
        "review.summary",
    ] {
        assert!(config.call(call_id).is_some(), "missing {call_id}");
    }
    assert_eq!(config.cost_ceiling("ideas.generate"), Some(0.4));

    let draft = resolve_effective_config(
        &config,
        "ideas.generate",
        ResolveOptions::default().with_preset("draft"),
    )
    .unwrap();
    assert_eq!(draft.call.prompt.outputs_expected, 5);
    assert_eq!(draft.global.log_level, LogLevel::Debug);
}
