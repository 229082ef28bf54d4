//! Sub-workflows embedded as steps.

use crate::config::WorkflowConfig;
use crate::flow::Flow;
use async_trait::async_trait;
use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;
use tsunagi_core::{Context, Step, Value, WorkflowError};

/// A step that runs an inner chain on a snapshot of the context.
///
/// Built with [`nested`] or [`subflow`]. Each execution snapshots the
/// context it is given, so stores made by the inner chain never reach the
/// outer context; only the inner chain's final value comes back, as this
/// step's output. The inner chain is awaited to completion, forks included.
///
/// The inner chain does not inherit the outer workflow's configuration: it
/// runs with [`WorkflowConfig::default()`] (so [`JoinPolicy::AwaitAll`])
/// unless set with [`Nested::with_config`].
///
/// [`JoinPolicy::AwaitAll`]: crate::JoinPolicy::AwaitAll
///
/// # Examples
///
/// ```
/// use tsunagi::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// let total = Workflow::start(0u32, |flow| async move {
///     flow.then_step(nested(20u32, |inner| async move {
///         inner
///             .then(|_ctx, n| async move { Ok(n * 2) })
///             .await
///     }))
///     .await
/// })
/// .await;
///
/// assert_eq!(total.ok(), Some(40));
/// # }
/// ```
pub struct Nested<E, F> {
    element: E,
    seeded: bool,
    block: F,
    config: WorkflowConfig,
}

impl<E: fmt::Debug, F> fmt::Debug for Nested<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nested")
            .field("element", &self.element)
            .field("seeded", &self.seeded)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E, F> Nested<E, F> {
    /// Sets the configuration of the inner chain.
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }
}

/// Builds a sub-workflow step seeded with `element`.
///
/// On execution `element` is stored into the snapshot and the inner chain
/// starts from `Ok(element)`.
pub fn nested<E, F, Fut, O>(element: E, block: F) -> Nested<E, F>
where
    E: Value,
    F: Fn(Flow<E>) -> Fut + Send + Sync,
    Fut: Future<Output = Flow<O>> + Send + 'static,
    O: Value,
{
    Nested {
        element,
        seeded: true,
        block,
        config: WorkflowConfig::default(),
    }
}

/// Builds a sub-workflow step with no seeded element; the inner chain
/// starts from `Ok(())` over an unmodified snapshot.
pub fn subflow<F, Fut, O>(block: F) -> Nested<(), F>
where
    F: Fn(Flow<()>) -> Fut + Send + Sync,
    Fut: Future<Output = Flow<O>> + Send + 'static,
    O: Value,
{
    Nested {
        element: (),
        seeded: false,
        block,
        config: WorkflowConfig::default(),
    }
}

#[async_trait]
impl<E, F, Fut, O> Step for Nested<E, F>
where
    E: Value,
    F: Fn(Flow<E>) -> Fut + Send + Sync,
    Fut: Future<Output = Flow<O>> + Send + 'static,
    O: Value,
{
    type Output = O;

    async fn execute(&self, ctx: Arc<Context>) -> Result<O, WorkflowError> {
        let inner = Arc::new(ctx.snapshot());
        if self.seeded {
            inner.store(self.element.clone());
        }
        debug!(
            "Entering nested workflow over '{}' producing '{}'",
            type_name::<E>(),
            type_name::<O>()
        );

        let flow =
            Flow::new(Ok(self.element.clone()), inner).with_config(self.config.clone());
        (self.block)(flow).await.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JoinPolicy;
    use std::time::Duration;
    use tsunagi_core::{step, StepExt};

    #[derive(Debug, Clone, PartialEq)]
    struct Order {
        id: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Invoice(String);

    #[tokio::test]
    async fn test_nested_output_becomes_step_output() {
        let ctx = Arc::new(Context::new());
        ctx.store("outer".to_string());

        let invoice = nested(Order { id: 7 }, |inner| async move {
            inner
                .then(|ctx, order| async move {
                    let label = ctx.get::<String>()?;
                    Ok(Invoice(format!("{label}-{}", order.id)))
                })
                .await
        });

        assert_eq!(
            invoice.execute(ctx.clone()).await.unwrap(),
            Invoice("outer-7".to_string())
        );
        // Inner stores stay inside the snapshot.
        assert!(!ctx.has::<Order>());
        assert!(!ctx.has::<Invoice>());
    }

    #[tokio::test]
    async fn test_nested_failure_becomes_step_failure() {
        let ctx = Arc::new(Context::new());
        let failing = nested(1u8, |inner| async move {
            inner
                .then(|_ctx, _n| async move {
                    Err::<u16, _>(WorkflowError::step_error("inner failed"))
                })
                .await
        });

        let err = failing.execute(ctx).await.unwrap_err();
        assert_eq!(err.message().as_deref(), Some("inner failed"));
    }

    #[tokio::test]
    async fn test_nested_stores_stay_inside() {
        let ctx = Arc::new(Context::new());
        ctx.store(false);

        let writer = nested(0u8, |inner| async move {
            inner.context().store(true);
            inner
                .then(|ctx, _| async move { Ok(ctx.get::<bool>()?) })
                .await
        });

        assert!(writer.execute(ctx.clone()).await.unwrap());
        assert!(!ctx.get::<bool>().unwrap());
        assert!(!ctx.has::<u8>());
    }

    #[tokio::test]
    async fn test_subflow_does_not_seed() {
        let ctx = Arc::new(Context::new());
        ctx.store(3u32);

        let probe = subflow(|inner| async move {
            inner
                .then(|ctx, _| async move { Ok((ctx.has::<()>(), ctx.get::<u32>()?)) })
                .await
        });

        assert_eq!(probe.execute(ctx).await.unwrap(), (false, 3));
    }

    #[tokio::test]
    async fn test_nested_fork_joins_before_return() {
        let ctx = Arc::new(Context::new());
        let fanout = nested(10u32, |inner| async move {
            let slow = step(|ctx: Arc<Context>| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(ctx.get::<u32>()? + 1)
            });
            let fast =
                step(|ctx: Arc<Context>| async move { Ok(u64::from(ctx.get::<u32>()?) * 2) });
            inner.fork(slow.and(fast)).await
        })
        .with_config(WorkflowConfig::default().with_join_policy(JoinPolicy::FailFast));

        assert_eq!(fanout.execute(ctx.clone()).await.unwrap(), (11, 20));
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_nested_does_not_inherit_outer_config() {
        let outer = Flow::new(Ok(()), Arc::new(Context::new()))
            .with_config(WorkflowConfig::default().with_join_policy(JoinPolicy::FailFast));

        let policy = outer
            .then_step(subflow(|inner| async move {
                let policy = inner.config().join_policy;
                inner.then(move |_ctx, _| async move { Ok(policy) }).await
            }))
            .await
            .into_result()
            .unwrap();
        assert_eq!(policy, JoinPolicy::AwaitAll);
    }
}
