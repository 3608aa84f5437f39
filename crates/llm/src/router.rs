//! Provider router
//!
//! Executes a spec against a registered adapter with bounded retries,
//! exponential backoff and at most one fallback provider. The control flow is
//! an explicit [`RetryMachine`]; the router only performs the side effects
//! (adapter calls and sleeps) each state asks for.

use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;

use content_engine_core::{AdapterResponse, Error, ErrorKind, ProviderAdapter, Result, TaskSpec};

use crate::registry::ProviderRegistry;

/// Default retry ceiling when the caller does not supply one
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Delay before the first retry
pub const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Backoff ceiling for text generation
pub const TEXT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Backoff ceiling for image generation
pub const IMAGE_BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Kind of generation a router serves; selects the backoff ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Text,
    Image,
}

/// Exponential backoff: `base * 2^(retry - 1)`, capped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn for_workload(workload: Workload) -> Self {
        match workload {
            Workload::Text => Self::new(BACKOFF_BASE, TEXT_BACKOFF_CAP),
            Workload::Image => Self::new(BACKOFF_BASE, IMAGE_BACKOFF_CAP),
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.cap, |d| d.min(self.cap))
    }
}

/// Which provider the machine is currently driving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Primary,
    Fallback,
}

/// Retry state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt number `attempt` (1-based) is due
    Attempting { attempt: u32 },
    /// Waiting `delay` after failed attempt `attempt`
    Backoff { attempt: u32, delay: Duration },
    /// Primary exhausted its retries; switch to the fallback provider
    FallbackAttempting,
    Succeeded,
    Failed(ErrorKind),
}

/// Retry/backoff/fallback state machine
///
/// Each provider gets `max_retries + 1` attempts. Terminal errors end the
/// machine immediately in any phase.
#[derive(Debug, Clone)]
pub struct RetryMachine {
    state: RetryState,
    phase: Phase,
    max_retries: u32,
    has_fallback: bool,
    backoff: BackoffPolicy,
}

impl RetryMachine {
    pub fn new(max_retries: u32, has_fallback: bool, backoff: BackoffPolicy) -> Self {
        Self {
            state: RetryState::Attempting { attempt: 1 },
            phase: Phase::Primary,
            max_retries,
            has_fallback,
            backoff,
        }
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RetryState::Succeeded | RetryState::Failed(_))
    }

    /// Record the outcome of the attempt that was due
    pub fn record(&mut self, outcome: std::result::Result<(), &Error>) -> &RetryState {
        let RetryState::Attempting { attempt } = self.state else {
            return &self.state;
        };

        self.state = match outcome {
            Ok(()) => RetryState::Succeeded,
            Err(err) if !err.is_retryable() => RetryState::Failed(err.kind()),
            Err(_) if attempt <= self.max_retries => RetryState::Backoff {
                attempt,
                delay: self.backoff.delay(attempt),
            },
            Err(_) if self.phase == Phase::Primary && self.has_fallback => {
                RetryState::FallbackAttempting
            }
            Err(err) => RetryState::Failed(err.kind()),
        };
        &self.state
    }

    /// The backoff delay has elapsed
    pub fn backoff_elapsed(&mut self) -> &RetryState {
        if let RetryState::Backoff { attempt, .. } = self.state {
            self.state = RetryState::Attempting {
                attempt: attempt + 1,
            };
        }
        &self.state
    }

    /// Fallback provider is ready; restart the attempt count with fallback
    /// disabled
    pub fn begin_fallback(&mut self) -> &RetryState {
        if self.state == RetryState::FallbackAttempting {
            self.phase = Phase::Fallback;
            self.has_fallback = false;
            self.state = RetryState::Attempting { attempt: 1 };
        }
        &self.state
    }

    /// A pre-flight check failed (unknown adapter, rejected spec, budget)
    pub fn abort(&mut self, err: &Error) -> &RetryState {
        self.state = RetryState::Failed(err.kind());
        &self.state
    }
}

/// Per-call routing options
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOptions {
    pub max_retries: u32,
    /// Provider tried after the primary exhausts its retries; ignored when
    /// equal to the primary
    pub fallback_provider: Option<String>,
    /// Wall-clock limit per adapter call
    pub timeout: Option<Duration>,
    /// Maximum estimated cost in USD
    pub cost_ceiling: Option<f64>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            fallback_provider: None,
            timeout: None,
            cost_ceiling: None,
        }
    }
}

impl RouteOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_fallback(mut self, provider_id: impl Into<String>) -> Self {
        self.fallback_provider = Some(provider_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cost_ceiling(mut self, ceiling: f64) -> Self {
        self.cost_ceiling = Some(ceiling);
        self
    }
}

/// Routes specs to provider adapters
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ProviderRegistry>,
    backoff: BackoffPolicy,
}

impl Router {
    pub fn new(registry: Arc<ProviderRegistry>, workload: Workload) -> Self {
        Self {
            registry,
            backoff: BackoffPolicy::for_workload(workload),
        }
    }

    /// Router for text generation
    pub fn text(registry: Arc<ProviderRegistry>) -> Self {
        Self::new(registry, Workload::Text)
    }

    /// Router for image generation
    pub fn image(registry: Arc<ProviderRegistry>) -> Self {
        Self::new(registry, Workload::Image)
    }

    /// Override the backoff policy
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Look up the adapter and run its pre-flight checks
    fn prepare(
        &self,
        spec: &TaskSpec,
        provider_id: &str,
        options: &RouteOptions,
    ) -> Result<Arc<dyn ProviderAdapter>> {
        let adapter = self
            .registry
            .get(provider_id)
            .ok_or_else(|| Error::AdapterNotFound(provider_id.to_string()))?;

        let validation = adapter.validate_spec(spec);
        if !validation.valid {
            return Err(Error::InvalidRequest(format!(
                "{} rejected spec for {}: {}",
                provider_id,
                spec.task_id,
                validation.errors.join("; ")
            )));
        }

        if let Some(ceiling) = options.cost_ceiling {
            let estimated = adapter.estimate_cost(spec);
            if estimated > ceiling {
                return Err(Error::BudgetExceeded { estimated, ceiling });
            }
        }

        Ok(adapter)
    }

    async fn attempt(
        adapter: &dyn ProviderAdapter,
        spec: &TaskSpec,
        timeout: Option<Duration>,
    ) -> Result<AdapterResponse> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, adapter.execute(spec))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => adapter.execute(spec).await,
        }
    }

    /// Execute one spec against `provider_id`
    pub async fn route_spec(
        &self,
        spec: &TaskSpec,
        provider_id: &str,
        options: &RouteOptions,
    ) -> Result<AdapterResponse> {
        let fallback = options
            .fallback_provider
            .as_deref()
            .filter(|fallback| *fallback != provider_id);

        let mut machine = RetryMachine::new(options.max_retries, fallback.is_some(), self.backoff);
        let mut provider = provider_id;
        let mut adapter = self.prepare(spec, provider, options);
        let mut response = None;
        let mut last_error = None;

        while !machine.is_finished() {
            match machine.state().clone() {
                RetryState::Attempting { attempt } => {
                    let current = match &adapter {
                        Ok(adapter) => Arc::clone(adapter),
                        Err(err) => {
                            machine.abort(err);
                            last_error = Some(err.clone());
                            break;
                        }
                    };

                    metrics::counter!(
                        "content_engine_router_attempts_total",
                        "provider" => provider.to_string()
                    )
                    .increment(1);

                    match Self::attempt(current.as_ref(), spec, options.timeout).await {
                        Ok(result) => {
                            machine.record(Ok(()));
                            response = Some(result);
                        }
                        Err(err) => {
                            machine.record(Err(&err));
                            if err.is_retryable() {
                                tracing::warn!(
                                    task_id = %spec.task_id,
                                    provider,
                                    attempt,
                                    max_attempts = options.max_retries + 1,
                                    error = %err,
                                    "Provider call failed"
                                );
                            } else {
                                tracing::error!(
                                    task_id = %spec.task_id,
                                    provider,
                                    attempt,
                                    error = %err,
                                    "Provider call failed with terminal error"
                                );
                            }
                            last_error = Some(err);
                        }
                    }
                }
                RetryState::Backoff { attempt, delay } => {
                    tracing::debug!(provider, attempt, ?delay, "Backing off before retry");
                    tokio::time::sleep(delay).await;
                    machine.backoff_elapsed();
                }
                RetryState::FallbackAttempting => {
                    // Only reachable when a distinct fallback exists
                    let Some(next) = fallback else {
                        break;
                    };
                    tracing::info!(
                        task_id = %spec.task_id,
                        from = provider,
                        to = next,
                        "Retries exhausted, falling back"
                    );
                    metrics::counter!(
                        "content_engine_router_fallbacks_total",
                        "from" => provider.to_string(),
                        "to" => next.to_string()
                    )
                    .increment(1);

                    provider = next;
                    adapter = self.prepare(spec, provider, options);
                    machine.begin_fallback();
                }
                RetryState::Succeeded | RetryState::Failed(_) => break,
            }
        }

        match response {
            Some(response) => {
                tracing::debug!(
                    task_id = %spec.task_id,
                    provider = %response.provider,
                    model = %response.model,
                    phase = ?machine.phase(),
                    "Provider call succeeded"
                );
                Ok(response)
            }
            None => Err(last_error
                .unwrap_or_else(|| Error::Unknown(format!("no attempt made for {}", provider)))),
        }
    }

    /// Execute many specs concurrently against the same provider.
    ///
    /// Results are aligned with `specs`; the first failure fails the batch.
    pub async fn route_batch(
        &self,
        specs: &[TaskSpec],
        provider_id: &str,
        options: &RouteOptions,
    ) -> Result<Vec<AdapterResponse>> {
        tracing::debug!(count = specs.len(), provider = provider_id, "Routing batch");
        try_join_all(
            specs
                .iter()
                .map(|spec| self.route_spec(spec, provider_id, options)),
        )
        .await
    }
}
