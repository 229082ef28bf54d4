//! Workflow entry point.

use crate::config::WorkflowConfig;
use crate::flow::Flow;
use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use tsunagi_core::{Context, Value, WorkflowError};

/// Owns one initial value and one context, and runs a chain over them once.
pub struct Workflow<T> {
    initial: T,
    ctx: Arc<Context>,
    config: WorkflowConfig,
}

impl<T: fmt::Debug> fmt::Debug for Workflow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("initial", &self.initial)
            .field("ctx", &self.ctx)
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Value> Workflow<T> {
    /// Creates a workflow whose fresh context is seeded with `initial`.
    pub fn new(initial: T) -> Self {
        let ctx = Context::new();
        ctx.store(initial.clone());
        Self::with_context(initial, ctx)
    }

    /// Creates a workflow over an existing context, used as-is.
    pub fn with_context(initial: T, ctx: Context) -> Self {
        Self {
            initial,
            ctx: Arc::new(ctx),
            config: WorkflowConfig::default(),
        }
    }

    /// Sets the configuration handed to every flow of this workflow.
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the workflow's context.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Returns the workflow's configuration.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Returns a flow carrying the initial value; the start of every chain.
    pub fn initial(&self) -> Flow<T> {
        Flow::new(Ok(self.initial.clone()), Arc::clone(&self.ctx))
            .with_config(self.config.clone())
    }

    /// Runs `block` once over the initial flow.
    ///
    /// # Errors
    ///
    /// Returns the chain's terminal failure.
    pub async fn run<V, F, Fut>(self, block: F) -> Result<V, WorkflowError>
    where
        F: FnOnce(Flow<T>) -> Fut,
        Fut: Future<Output = Flow<V>>,
    {
        info!("Workflow started from '{}'", type_name::<T>());
        let result = block(self.initial()).await.into_result();
        match &result {
            Ok(_) => info!(
                "Workflow completed with '{}' in {:?}",
                type_name::<V>(),
                self.ctx.elapsed()
            ),
            Err(e) => warn!("Workflow failed after {:?}: {}", self.ctx.elapsed(), e),
        }
        result
    }

    /// Creates a workflow from `initial` and runs `block` over it.
    ///
    /// # Errors
    ///
    /// Returns the chain's terminal failure.
    pub async fn start<V, F, Fut>(initial: T, block: F) -> Result<V, WorkflowError>
    where
        F: FnOnce(Flow<T>) -> Fut,
        Fut: Future<Output = Flow<V>>,
    {
        Self::new(initial).run(block).await
    }
}
