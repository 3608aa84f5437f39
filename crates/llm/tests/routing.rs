//! Router behaviour against scripted adapters

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use content_engine_core::{
    AdapterResponse, Error, ErrorKind, ProviderAdapter, Result, SpecValidation, TaskSpec,
};
use content_engine_llm::{BackoffPolicy, ProviderRegistry, RouteOptions, Router};

/// Adapter that replays a script of outcomes, repeating the last one
struct Scripted {
    id: &'static str,
    script: Mutex<VecDeque<Result<String>>>,
    calls: AtomicU32,
    delay: Option<Duration>,
    valid: bool,
    cost: f64,
}

impl Scripted {
    fn new(id: &'static str, script: Vec<Result<String>>) -> Self {
        Self {
            id,
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            delay: None,
            valid: true,
            cost: 0.0,
        }
    }

    fn always(id: &'static str, outcome: Result<String>) -> Self {
        Self::new(id, vec![outcome])
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for Scripted {
    fn provider_id(&self) -> &str {
        self.id
    }

    async fn execute(&self, spec: &TaskSpec) -> Result<AdapterResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = {
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        match outcome {
            Some(Ok(output)) => Ok(AdapterResponse::single(
                self.id,
                "scripted-1",
                output.replace("{task}", &spec.task_id),
            )),
            Some(Err(err)) => Err(err),
            None => Err(Error::Unknown("empty script".into())),
        }
    }

    fn estimate_cost(&self, _spec: &TaskSpec) -> f64 {
        self.cost
    }

    fn validate_spec(&self, _spec: &TaskSpec) -> SpecValidation {
        if self.valid {
            SpecValidation::ok()
        } else {
            SpecValidation::from_errors(vec!["model not supported".into()])
        }
    }

    fn available_models(&self) -> Vec<String> {
        vec!["scripted-1".into()]
    }
}

fn router(adapters: Vec<Arc<Scripted>>) -> Router {
    let mut registry = ProviderRegistry::new();
    for adapter in adapters {
        registry.register_arc(adapter);
    }
    Router::text(Arc::new(registry))
        .with_backoff(BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(4)))
}

fn spec() -> TaskSpec {
    TaskSpec::new("ideas.generate", "sys", "user")
}

fn rate_limited() -> Result<String> {
    Err(Error::RateLimited("429".into()))
}

#[tokio::test]
async fn test_retryable_error_invokes_max_retries_plus_one() {
    let primary = Arc::new(Scripted::always("openai", rate_limited()));
    let router = router(vec![primary.clone()]);

    let err = router
        .route_spec(&spec(), "openai", &RouteOptions::default().with_max_retries(3))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(primary.calls(), 4);
}

#[tokio::test]
async fn test_authentication_failure_short_circuits() {
    let primary = Arc::new(Scripted::always(
        "openai",
        Err(Error::AuthenticationFailed("bad key".into())),
    ));
    let fallback = Arc::new(Scripted::always("claude", Ok("[]".into())));
    let router = router(vec![primary.clone(), fallback.clone()]);

    let err = router
        .route_spec(
            &spec(),
            "openai",
            &RouteOptions::default().with_max_retries(5).with_fallback("claude"),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let primary = Arc::new(Scripted::new(
        "openai",
        vec![
            Err(Error::Network("reset".into())),
            Err(Error::Timeout(Duration::from_secs(1))),
            Ok("{task}".into()),
        ],
    ));
    let router = router(vec![primary.clone()]);

    let response = router
        .route_spec(&spec(), "openai", &RouteOptions::default().with_max_retries(2))
        .await
        .unwrap();

    assert_eq!(response.outputs, vec!["ideas.generate".to_string()]);
    assert_eq!(primary.calls(), 3);
}

#[tokio::test]
async fn test_fallback_after_exhaustion_gets_full_budget() {
    let primary = Arc::new(Scripted::always("openai", rate_limited()));
    let fallback = Arc::new(Scripted::new(
        "claude",
        vec![Err(Error::Network("reset".into())), Ok("ok".into())],
    ));
    let router = router(vec![primary.clone(), fallback.clone()]);

    let response = router
        .route_spec(
            &spec(),
            "openai",
            &RouteOptions::default().with_max_retries(1).with_fallback("claude"),
        )
        .await
        .unwrap();

    assert_eq!(response.provider, "claude");
    assert_eq!(primary.calls(), 2);
    assert_eq!(fallback.calls(), 2);
}

#[tokio::test]
async fn test_fallback_exhaustion_propagates_last_error() {
    let primary = Arc::new(Scripted::always("openai", rate_limited()));
    let fallback = Arc::new(Scripted::always("claude", Err(Error::Network("down".into()))));
    let router = router(vec![primary.clone(), fallback.clone()]);

    let err = router
        .route_spec(
            &spec(),
            "openai",
            &RouteOptions::default().with_max_retries(1).with_fallback("claude"),
        )
        .await
        .unwrap_err();

    assert_eq!(err, Error::Network("down".into()));
    assert_eq!(primary.calls(), 2);
    assert_eq!(fallback.calls(), 2);
}

#[tokio::test]
async fn test_same_fallback_id_is_ignored() {
    let primary = Arc::new(Scripted::always("openai", rate_limited()));
    let router = router(vec![primary.clone()]);

    router
        .route_spec(
            &spec(),
            "openai",
            &RouteOptions::default().with_max_retries(1).with_fallback("openai"),
        )
        .await
        .unwrap_err();

    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn test_unknown_provider() {
    let router = router(vec![]);
    let err = router
        .route_spec(&spec(), "gemini", &RouteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, Error::AdapterNotFound("gemini".into()));
}

#[tokio::test]
async fn test_invalid_spec_makes_no_attempt() {
    let mut adapter = Scripted::always("openai", Ok("[]".into()));
    adapter.valid = false;
    let adapter = Arc::new(adapter);
    let fallback = Arc::new(Scripted::always("claude", Ok("[]".into())));
    let router = router(vec![adapter.clone(), fallback.clone()]);

    let err = router
        .route_spec(&spec(), "openai", &RouteOptions::default().with_fallback("claude"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(adapter.calls(), 0);
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_cost_ceiling_blocks_execution() {
    let mut adapter = Scripted::always("openai", Ok("[]".into()));
    adapter.cost = 0.75;
    let adapter = Arc::new(adapter);
    let router = router(vec![adapter.clone()]);

    let err = router
        .route_spec(&spec(), "openai", &RouteOptions::default().with_cost_ceiling(0.5))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BudgetExceeded { ceiling, .. } if ceiling == 0.5));
    assert_eq!(adapter.calls(), 0);

    router
        .route_spec(&spec(), "openai", &RouteOptions::default().with_cost_ceiling(1.0))
        .await
        .unwrap();
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test]
async fn test_timeout_is_retryable() {
    let mut adapter = Scripted::always("openai", Ok("[]".into()));
    adapter.delay = Some(Duration::from_millis(200));
    let adapter = Arc::new(adapter);
    let router = router(vec![adapter.clone()]);

    let err = router
        .route_spec(
            &spec(),
            "openai",
            &RouteOptions::default()
                .with_max_retries(1)
                .with_timeout(Duration::from_millis(10)),
        )
        .await
        .unwrap_err();

    assert_eq!(err, Error::Timeout(Duration::from_millis(10)));
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let adapter = Arc::new(Scripted::always("openai", Ok("{task}".into())));
    let router = router(vec![adapter.clone()]);
    let specs: Vec<TaskSpec> = (0..5)
        .map(|i| TaskSpec::new(format!("task-{}", i), "sys", "user"))
        .collect();

    let responses = router
        .route_batch(&specs, "openai", &RouteOptions::default())
        .await
        .unwrap();

    let outputs: Vec<_> = responses.iter().map(|r| r.outputs[0].as_str()).collect();
    assert_eq!(outputs, vec!["task-0", "task-1", "task-2", "task-3", "task-4"]);
}

#[tokio::test]
async fn test_batch_fails_on_any_failure() {
    let adapter = Arc::new(Scripted::new(
        "openai",
        vec![
            Ok("a".into()),
            Err(Error::ContentFiltered("blocked".into())),
            Ok("c".into()),
        ],
    ));
    let router = router(vec![adapter]);
    let specs = vec![spec(), spec(), spec()];

    let err = router
        .route_batch(&specs, "openai", &RouteOptions::default().with_max_retries(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContentFiltered);
}
