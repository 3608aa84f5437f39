//! Router-backed task executor

use async_trait::async_trait;
use std::sync::Arc;

use content_engine_config::Configuration;
use content_engine_core::{AdapterResponse, Result, TaskSpec};
use content_engine_llm::{RouteOptions, Router};

use crate::orchestrator::TaskExecutor;

/// Routing options for a call: retries, timeout and fallback from its
/// runtime and model sections, ceiling from [`Configuration::cost_ceiling`]
pub fn route_options_for(config: &Configuration, task_id: &str) -> Result<RouteOptions> {
    let call = config.require_call(task_id)?;
    Ok(RouteOptions {
        max_retries: call.runtime.max_retries,
        fallback_provider: call.model.fallback_provider.clone(),
        timeout: Some(call.runtime.timeout()),
        cost_ceiling: config.cost_ceiling(task_id),
    })
}

/// Executes specs through a [`Router`] using per-call routing options
#[derive(Debug, Clone)]
pub struct RouterExecutor {
    router: Router,
    config: Arc<Configuration>,
}

impl RouterExecutor {
    pub fn new(router: Router, config: Arc<Configuration>) -> Self {
        Self { router, config }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

#[async_trait]
impl TaskExecutor for RouterExecutor {
    async fn execute(&self, spec: &TaskSpec, provider_id: &str) -> Result<AdapterResponse> {
        let options = route_options_for(&self.config, &spec.task_id)?;
        self.router.route_spec(spec, provider_id, &options).await
    }
}
