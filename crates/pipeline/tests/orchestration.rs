//! End-to-end orchestration against mock executors and adapters

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use content_engine_config::Configuration;
use content_engine_core::{
    AdapterResponse, Error, ErrorKind, ProviderAdapter, Result, SpecValidation, TaskSpec,
    TokenUsage, ValidationOutcome, UNKNOWN,
};
use content_engine_llm::{BackoffPolicy, ProviderRegistry, Router};
use content_engine_pipeline::{
    build_copy_spec, build_ideas_spec, run_task, run_task_batch, BatchTask, BuildOptions,
    OutputValidator, RouterExecutor, RunOptions, TaskExecutor,
};

fn call(provider: &str, fallback: Option<&str>, outputs: u32, max_retries: u32) -> Value {
    json!({
        "model": {
            "provider": provider,
            "model": "gpt-4o",
            "temperature": 0.7,
            "max_tokens": 1000,
            "fallback_provider": fallback
        },
        "prompt": {
            "system": "You write marketing content.",
            "user_template": "Kernel: {{kernel}} Idea: {{idea}}",
            "outputs_expected": outputs
        },
        "runtime": { "timeout_ms": 5000, "max_retries": max_retries, "cost_ceiling": 0.5 }
    })
}

fn config() -> Configuration {
    serde_json::from_value(json!({
        "global": {
            "provider": "openai",
            "log_level": "info",
            "cache_enabled": false,
            "cache_ttl": { "scrape": 1, "llm": 1, "image": 1 }
        },
        "calls": {
            "ideas.generate": call("openai", Some("claude"), 3, 1),
            "copy.generate": call("openai", None, 1, 0)
        }
    }))
    .unwrap()
}

fn idea(i: usize) -> Value {
    json!({
        "headline": format!("Headline number {} for teams", i),
        "angle": "practical",
        "audience": "operators",
        "format": "post",
        "rationale": "fits the brand",
        "evidence_refs": ["kernel.proof[0]"]
    })
}

fn ideas_raw(n: usize) -> String {
    Value::Array((0..n).map(idea).collect()).to_string()
}

fn response(provider: &str, raw: &str) -> AdapterResponse {
    let mut response = AdapterResponse::single(provider, "gpt-4o", raw);
    response.usage = TokenUsage::new(120, 480);
    response.cost = 0.0051;
    response
}

fn ideas_spec() -> TaskSpec {
    build_ideas_spec(&config(), &json!({ "domain": "acme.io" }), &BuildOptions::default()).unwrap()
}

/// Executor that replays scripted results and records every call
#[derive(Default)]
struct MockExecutor {
    script: Mutex<VecDeque<Result<AdapterResponse>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockExecutor {
    fn new(script: Vec<Result<AdapterResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TaskExecutor for MockExecutor {
    async fn execute(&self, spec: &TaskSpec, provider_id: &str) -> Result<AdapterResponse> {
        self.calls
            .lock()
            .push((spec.task_id.clone(), provider_id.to_string()));
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Unknown("script exhausted".into())))
    }
}

struct PanickingExecutor;

#[async_trait]
impl TaskExecutor for PanickingExecutor {
    async fn execute(&self, _spec: &TaskSpec, _provider_id: &str) -> Result<AdapterResponse> {
        panic!("adapter exploded");
    }
}

#[tokio::test]
async fn test_successful_ideas_task() {
    let executor = MockExecutor::new(vec![Ok(response("openai", &ideas_raw(3)))]);
    let result = run_task(
        &ideas_spec(),
        &config(),
        &executor,
        None,
        &RunOptions::default().with_run_id("run-1"),
    )
    .await;

    assert!(result.success, "{:?}", result.validation.errors);
    assert_eq!(result.outputs.len(), 3);
    assert!(result.error.is_none());
    assert_eq!(result.audit.run_id, "run-1");
    assert_eq!(result.audit.task_id, "ideas.generate");
    assert_eq!(result.audit.provider, "openai");
    assert_eq!(result.audit.usage.total_tokens, 600);
    assert!((result.audit.cost - 0.0051).abs() < 1e-9);
    assert_eq!(executor.calls(), vec![("ideas.generate".to_string(), "openai".to_string())]);
}

#[tokio::test]
async fn test_enveloped_ideas_from_chat_completion_pass_validation() {
    let body = json!({ "ideas": (0..3).map(idea).collect::<Vec<_>>() }).to_string();
    let executor = MockExecutor::new(vec![Ok(response("openai", &body))]);
    let spec = ideas_spec();
    assert_eq!(spec.outputs_expected, 3);

    let result = run_task(&spec, &config(), &executor, None, &RunOptions::default()).await;

    assert!(result.success, "{:?}", result.validation.errors);
    assert_eq!(result.outputs.len(), 3);
    assert_eq!(result.outputs[1], idea(1));
}

/// Executor that takes a while but reports no duration of its own
struct SlowExecutor(Duration);

#[async_trait]
impl TaskExecutor for SlowExecutor {
    async fn execute(&self, _spec: &TaskSpec, provider_id: &str) -> Result<AdapterResponse> {
        tokio::time::sleep(self.0).await;
        let mut response = response(provider_id, &ideas_raw(3));
        response.duration_ms = 0;
        Ok(response)
    }
}

#[tokio::test]
async fn test_audit_duration_covers_whole_run() {
    let executor = SlowExecutor(Duration::from_millis(40));
    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;

    assert!(result.success, "{:?}", result.validation.errors);
    assert!(result.audit.duration_ms >= 40, "{}", result.audit.duration_ms);
}

#[tokio::test]
async fn test_validation_failure_is_data_not_error() {
    let executor = MockExecutor::new(vec![Ok(response("openai", &ideas_raw(2)))]);
    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;

    assert!(!result.success);
    assert!(result.error.is_none());
    assert_eq!(result.outputs.len(), 2);
    assert!(result.validation.errors[0].contains("expected 3 ideas"));
}

#[tokio::test]
async fn test_executor_error_becomes_failed_result() {
    let executor = MockExecutor::new(vec![Err(Error::Timeout(Duration::from_secs(5)))]);
    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;

    assert!(!result.success);
    assert!(result.outputs.is_empty());
    assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    assert!(!result.validation.passed);
    assert_eq!(result.audit.provider, UNKNOWN);
    assert_eq!(result.audit.model, UNKNOWN);
    assert_eq!(result.audit.usage, TokenUsage::default());
    assert_eq!(result.audit.cost, 0.0);
}

#[tokio::test]
async fn test_unknown_call_fails_without_executing() {
    let executor = MockExecutor::new(vec![]);
    let spec = TaskSpec::new("video.script", "sys", "user");
    let result = run_task(&spec, &config(), &executor, None, &RunOptions::default()).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Configuration));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_parse_failure_keeps_response_audit() {
    let executor = MockExecutor::new(vec![Ok(response("claude", "Sure! Here are ideas"))]);
    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::PipelineParse));
    assert_eq!(result.audit.provider, "claude");
    assert_eq!(result.audit.usage.prompt_tokens, 120);
}

#[tokio::test]
async fn test_executor_panic_is_contained() {
    let result = run_task(
        &ideas_spec(),
        &config(),
        &PanickingExecutor,
        None,
        &RunOptions::default(),
    )
    .await;

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::Unknown));
    assert!(result.error.unwrap().message.contains("adapter exploded"));
}

#[tokio::test]
async fn test_provider_override_and_skip_validation() {
    let executor = MockExecutor::new(vec![Ok(response("claude", "[1, 2]"))]);
    let options = RunOptions::default().with_provider("claude").skip_validation();
    let result = run_task(&ideas_spec(), &config(), &executor, None, &options).await;

    assert!(result.success);
    assert_eq!(result.outputs, vec![json!(1), json!(2)]);
    assert_eq!(executor.calls()[0].1, "claude");
}

struct RejectAll;

impl OutputValidator for RejectAll {
    fn validate(&self, task_id: &str, _outputs: &[Value], _config: &Configuration) -> ValidationOutcome {
        ValidationOutcome::fail(format!("{} rejected", task_id))
    }
}

#[tokio::test]
async fn test_custom_validator_is_used() {
    let executor = MockExecutor::new(vec![Ok(response("openai", &ideas_raw(3)))]);
    let result = run_task(
        &ideas_spec(),
        &config(),
        &executor,
        Some(&RejectAll),
        &RunOptions::default(),
    )
    .await;

    assert!(!result.success);
    assert_eq!(result.validation.errors, vec!["ideas.generate rejected".to_string()]);
}

#[tokio::test]
async fn test_run_id_falls_back_to_spec_then_generated() {
    let executor = MockExecutor::new(vec![
        Ok(response("openai", &ideas_raw(3))),
        Ok(response("openai", &ideas_raw(3))),
    ]);
    let spec = ideas_spec().with_run_id("from-spec");
    let result = run_task(&spec, &config(), &executor, None, &RunOptions::default()).await;
    assert_eq!(result.audit.run_id, "from-spec");

    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;
    assert_eq!(result.audit.run_id.len(), 14 + 1 + 8);
}

fn copy_spec() -> TaskSpec {
    build_copy_spec(&config(), &json!({}), &idea(0), &BuildOptions::default()).unwrap()
}

#[tokio::test]
async fn test_batch_runs_in_order_past_failures() {
    let executor = MockExecutor::new(vec![
        Err(Error::Network("reset".into())),
        Ok(response("openai", &ideas_raw(3))),
    ]);
    let tasks = vec![BatchTask::new(copy_spec()), BatchTask::new(ideas_spec())];
    let results = run_task_batch(&tasks, &config(), &executor).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].audit.task_id, "copy.generate");
    assert!(!results[0].success);
    assert_eq!(results[1].audit.task_id, "ideas.generate");
    assert!(results[1].success);
}

#[tokio::test]
async fn test_critical_failure_stops_batch() {
    let executor = MockExecutor::new(vec![
        Ok(response("openai", &ideas_raw(1))),
        Ok(response("openai", "{}")),
    ]);
    let tasks = vec![
        BatchTask::new(ideas_spec()).with_options(RunOptions::default().critical()),
        BatchTask::new(copy_spec()),
    ];
    let results = run_task_batch(&tasks, &config(), &executor).await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(executor.calls().len(), 1);
}

/// Provider adapter that fails a fixed number of times before answering
struct FlakyAdapter {
    id: &'static str,
    failures: u32,
    terminal: bool,
    cost: f64,
    calls: AtomicU32,
}

impl FlakyAdapter {
    fn new(id: &'static str, failures: u32) -> Self {
        Self {
            id,
            failures,
            terminal: false,
            cost: 0.01,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for FlakyAdapter {
    fn provider_id(&self) -> &str {
        self.id
    }

    async fn execute(&self, _spec: &TaskSpec) -> Result<AdapterResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.terminal {
            return Err(Error::AuthenticationFailed("bad key".into()));
        }
        if n < self.failures {
            return Err(Error::Network("connection reset".into()));
        }
        Ok(response(self.id, &ideas_raw(3)))
    }

    fn estimate_cost(&self, _spec: &TaskSpec) -> f64 {
        self.cost
    }

    fn validate_spec(&self, _spec: &TaskSpec) -> SpecValidation {
        SpecValidation::ok()
    }

    fn available_models(&self) -> Vec<String> {
        vec!["gpt-4o".into()]
    }
}

fn router_executor(adapters: Vec<Arc<FlakyAdapter>>) -> RouterExecutor {
    let mut registry = ProviderRegistry::new();
    for adapter in adapters {
        registry.register_arc(adapter);
    }
    let router = Router::text(Arc::new(registry))
        .with_backoff(BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(2)));
    RouterExecutor::new(router, Arc::new(config()))
}

#[tokio::test]
async fn test_router_executor_retries_with_configured_budget() {
    let openai = Arc::new(FlakyAdapter::new("openai", 1));
    let executor = router_executor(vec![openai.clone()]);

    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;

    assert!(result.success, "{:?}", result.validation.errors);
    assert_eq!(openai.calls(), 2);
}

#[tokio::test]
async fn test_router_executor_uses_configured_fallback() {
    let openai = Arc::new(FlakyAdapter::new("openai", u32::MAX));
    let claude = Arc::new(FlakyAdapter::new("claude", 0));
    let executor = router_executor(vec![openai.clone(), claude.clone()]);

    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;

    assert!(result.success);
    assert_eq!(result.audit.provider, "claude");
    // max_retries = 1 on the primary
    assert_eq!(openai.calls(), 2);
    assert_eq!(claude.calls(), 1);
}

#[tokio::test]
async fn test_router_executor_terminal_error_skips_fallback() {
    let mut openai = FlakyAdapter::new("openai", 0);
    openai.terminal = true;
    let openai = Arc::new(openai);
    let claude = Arc::new(FlakyAdapter::new("claude", 0));
    let executor = router_executor(vec![openai.clone(), claude.clone()]);

    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::AuthenticationFailed));
    assert_eq!(openai.calls(), 1);
    assert_eq!(claude.calls(), 0);
}

#[tokio::test]
async fn test_router_executor_enforces_cost_ceiling() {
    let mut openai = FlakyAdapter::new("openai", 0);
    openai.cost = 2.0;
    let openai = Arc::new(openai);
    let executor = router_executor(vec![openai.clone()]);

    let result = run_task(&ideas_spec(), &config(), &executor, None, &RunOptions::default()).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::BudgetExceeded));
    assert_eq!(openai.calls(), 0);
}
