//! Task orchestration
//!
//! `run_task` drives one spec through execution, parsing and validation and
//! always produces a [`TaskResult`]. Errors become failed results carrying
//! an audit record; they are never propagated to the caller.

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use content_engine_config::Configuration;
use content_engine_core::{
    AdapterResponse, AuditRecord, Error, Result, TaskResult, TaskSpec, ValidationOutcome,
};

use crate::parser::parse_outputs;
use crate::validator::{OutputValidator, DEFAULT_VALIDATOR};

/// Executes a spec against a named provider
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, spec: &TaskSpec, provider_id: &str) -> Result<AdapterResponse>;
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Use this provider instead of the call's configured one
    pub provider_override: Option<String>,
    pub skip_validation: bool,
    /// A failed critical task stops the batch it belongs to
    pub critical: bool,
    /// Takes precedence over the spec's own run id
    pub run_id: Option<String>,
}

impl RunOptions {
    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_override = Some(provider_id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

/// `<UTC yyyymmddHHMMSS>-<8 hex>`
pub fn generate_run_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S"), &suffix[..8])
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn record_outcome(task_id: &str, outcome: &'static str) {
    metrics::counter!(
        "content_engine_tasks_total",
        "task" => task_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

fn failure(err: &Error, task_id: &str, run_id: &str, started: Instant) -> TaskResult {
    tracing::warn!(task_id, run_id, kind = err.kind().as_str(), error = %err, "Task failed");
    record_outcome(task_id, "error");
    TaskResult::failed(err, AuditRecord::unknown(task_id, run_id, elapsed_ms(started)))
}

/// Run one task to completion
pub async fn run_task(
    spec: &TaskSpec,
    config: &Configuration,
    executor: &dyn TaskExecutor,
    validator: Option<&dyn OutputValidator>,
    options: &RunOptions,
) -> TaskResult {
    let started = Instant::now();
    let task_id = spec.task_id.as_str();
    let run_id = options
        .run_id
        .clone()
        .or_else(|| spec.metadata.run_id.clone())
        .unwrap_or_else(generate_run_id);

    let call = match config.require_call(task_id) {
        Ok(call) => call,
        Err(e) => return failure(&e, task_id, &run_id, started),
    };
    let provider = options
        .provider_override
        .as_deref()
        .unwrap_or(call.model.provider.as_str());

    tracing::debug!(task_id, run_id = %run_id, provider, "Executing task");

    let executed = AssertUnwindSafe(executor.execute(spec, provider))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "executor panicked".to_string());
            Err(Error::Unknown(message))
        });

    let response = match executed {
        Ok(response) => response,
        Err(e) => return failure(&e, task_id, &run_id, started),
    };

    let mut audit = AuditRecord {
        task_id: task_id.to_string(),
        run_id: run_id.clone(),
        provider: response.provider.clone(),
        model: response.model.clone(),
        usage: response.usage,
        cost: response.cost,
        duration_ms: 0,
        cached: response.metadata.cached,
        timestamp: Utc::now(),
    };

    let outputs = match parse_outputs(&response, spec.response_format, call.prompt.outputs_expected) {
        Ok(outputs) => outputs,
        Err(e) => {
            tracing::warn!(task_id, run_id = %run_id, provider = %response.provider, error = %e, "Unparseable output");
            record_outcome(task_id, "error");
            audit.duration_ms = elapsed_ms(started);
            return TaskResult::failed(&e, audit);
        }
    };

    let validation = if options.skip_validation {
        ValidationOutcome::pass()
    } else {
        validator
            .unwrap_or(&*DEFAULT_VALIDATOR)
            .validate(task_id, &outputs, config)
    };

    audit.duration_ms = elapsed_ms(started);
    let outcome = if validation.passed { "success" } else { "validation_failed" };
    record_outcome(task_id, outcome);
    tracing::info!(
        task_id,
        run_id = %run_id,
        provider = %audit.provider,
        model = %audit.model,
        outputs = outputs.len(),
        errors = validation.errors.len(),
        warnings = validation.warnings.len(),
        cost = audit.cost,
        duration_ms = audit.duration_ms,
        outcome,
        "Task finished"
    );

    TaskResult {
        success: validation.passed,
        outputs,
        validation,
        audit,
        error: None,
    }
}

/// One entry of a batch
#[derive(Debug, Clone)]
pub struct BatchTask {
    pub spec: TaskSpec,
    pub options: RunOptions,
}

impl BatchTask {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            spec,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }
}

/// Run tasks one after another in declared order.
///
/// Failures do not stop the batch unless the failing task is critical; the
/// failed critical result is the last one returned.
pub async fn run_task_batch(
    tasks: &[BatchTask],
    config: &Configuration,
    executor: &dyn TaskExecutor,
) -> Vec<TaskResult> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        let result = run_task(&task.spec, config, executor, None, &task.options).await;
        let stop = task.options.critical && !result.success;
        results.push(result);
        if stop {
            tracing::warn!(
                task_id = %task.spec.task_id,
                completed = results.len(),
                remaining = tasks.len() - results.len(),
                "Critical task failed, stopping batch"
            );
            break;
        }
    }
    results
}
