//! The combinators that thread a `Result` through steps.

use crate::config::{JoinPolicy, WorkflowConfig};
use futures::future::{self, Either};
use futures::FutureExt;
use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};
use tsunagi_core::{Context, PairSteps, Step, Value, WorkflowError};

/// A chained `Result` bound to the context it runs against.
///
/// Every combinator consumes the flow and returns the next one, so a chain
/// reads top to bottom in evaluation order:
///
/// ```
/// use tsunagi::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() {
/// let output = Workflow::start("initial".to_string(), |flow| async move {
///     flow.then_step(seed(["step1", "step2"]))
///         .await
///         .then(|_ctx, input| async move { Ok(format!("processed: {input}")) })
///         .await
///         .end::<String>()
/// })
/// .await;
///
/// assert_eq!(output.ok().as_deref(), Some("processed: step2"));
/// # }
/// ```
pub struct Flow<T> {
    result: Result<T, WorkflowError>,
    ctx: Arc<Context>,
    config: WorkflowConfig,
}

impl<T: fmt::Debug> fmt::Debug for Flow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("result", &self.result)
            .field("ctx", &self.ctx)
            .field("config", &self.config)
            .finish()
    }
}

impl<T> Flow<T> {
    /// Creates a flow carrying `result` over `ctx`, with the default
    /// configuration.
    pub fn new(result: Result<T, WorkflowError>, ctx: Arc<Context>) -> Self {
        Self {
            result,
            ctx,
            config: WorkflowConfig::default(),
        }
    }

    /// Replaces the configuration carried down the chain.
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the shared context.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Returns the configuration carried down the chain.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Returns the current result.
    pub fn result(&self) -> &Result<T, WorkflowError> {
        &self.result
    }

    /// Returns `true` if the chain currently carries a value.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Consumes the flow, returning its result.
    pub fn into_result(self) -> Result<T, WorkflowError> {
        self.result
    }

    fn from_parts(
        ctx: Arc<Context>,
        config: WorkflowConfig,
        result: Result<T, WorkflowError>,
    ) -> Self {
        Self {
            result,
            ctx,
            config,
        }
    }
}

impl<T: Value> Flow<T> {
    /// Sequential pipe.
    ///
    /// On failure the handler is skipped and the failure passes through.
    /// On success the handler receives the context and the current value;
    /// its output is stored in the context and becomes the new value. A
    /// handler error (or panic) becomes the new failure and nothing is
    /// stored.
    pub async fn then<O, F, Fut>(self, handler: F) -> Flow<O>
    where
        O: Value,
        F: FnOnce(Arc<Context>, T) -> Fut,
        Fut: Future<Output = Result<O, WorkflowError>>,
    {
        let Flow {
            result,
            ctx,
            config,
        } = self;
        let input = match result {
            Ok(input) => input,
            Err(e) => return Flow::from_parts(ctx, config, Err(e)),
        };

        let handler_ctx = Arc::clone(&ctx);
        let result = match guarded(async move { handler(handler_ctx, input).await }).await {
            Ok(output) => {
                debug!("Step produced '{}'", type_name::<O>());
                Ok(ctx.store(output))
            }
            Err(e) => {
                warn!("Step producing '{}' failed: {}", type_name::<O>(), e);
                Err(e)
            }
        };
        Flow::from_parts(ctx, config, result)
    }

    /// Sequential pipe into a [`Step`]; the current value is ignored since
    /// the step reads what it needs from the context.
    pub async fn then_step<S: Step>(self, step: S) -> Flow<S::Output> {
        self.then(move |ctx, _| async move { step.execute(ctx).await })
            .await
    }

    /// Parallel-pair fork/join using the configured [`JoinPolicy`].
    ///
    /// Both steps run as separate tasks against the shared context and each
    /// stores its own output. The joined value is `(first, second)` in
    /// declaration order whatever the completion order. When both fail, the
    /// first step's failure wins under [`JoinPolicy::AwaitAll`].
    ///
    /// Must be called from within a tokio runtime.
    pub async fn fork<A, B>(self, pair: PairSteps<A, B>) -> Flow<(A::Output, B::Output)>
    where
        A: Step + 'static,
        B: Step + 'static,
    {
        let policy = self.config.join_policy;
        self.fork_with(pair, policy).await
    }

    /// Parallel-pair fork/join with an explicit [`JoinPolicy`].
    pub async fn fork_with<A, B>(
        self,
        pair: PairSteps<A, B>,
        policy: JoinPolicy,
    ) -> Flow<(A::Output, B::Output)>
    where
        A: Step + 'static,
        B: Step + 'static,
    {
        let Flow {
            result,
            ctx,
            config,
        } = self;
        let input = match result {
            Ok(input) => input,
            Err(e) => return Flow::from_parts(ctx, config, Err(e)),
        };

        debug!(
            "Forking '{}' and '{}' ({:?})",
            type_name::<A::Output>(),
            type_name::<B::Output>(),
            policy
        );
        let PairSteps { first, second } = pair;
        let first = Branch::spawn(branch(
            Flow::from_parts(Arc::clone(&ctx), config.clone(), Ok(input.clone())),
            first,
        ));
        let second = Branch::spawn(branch(
            Flow::from_parts(Arc::clone(&ctx), config.clone(), Ok(input)),
            second,
        ));

        let result = match policy {
            JoinPolicy::AwaitAll => {
                let (first, second) = tokio::join!(first, second);
                join_pair(joined(first), joined(second))
            }
            JoinPolicy::FailFast => fail_fast(first, second).await,
        };
        Flow::from_parts(ctx, config, result)
    }

    /// Runs `step` for its side effect when the chain has failed.
    ///
    /// The failure is recorded as the context's current failure first. The
    /// original failure is passed on unchanged unless the step itself fails,
    /// in which case the step's error replaces it. Successful flows pass
    /// through without running the step.
    pub async fn on_failure<S: Step>(self, step: S) -> Flow<T> {
        self.on_failure_with(move |ctx, _| async move { step.execute(ctx).await })
            .await
    }

    /// Like [`Flow::on_failure`], with an inline handler that also receives
    /// the failure.
    pub async fn on_failure_with<O, F, Fut>(self, handler: F) -> Flow<T>
    where
        F: FnOnce(Arc<Context>, WorkflowError) -> Fut,
        Fut: Future<Output = Result<O, WorkflowError>>,
    {
        let Flow {
            result,
            ctx,
            config,
        } = self;
        let error = match result {
            Ok(value) => return Flow::from_parts(ctx, config, Ok(value)),
            Err(e) => e,
        };

        ctx.set_current_failure(error.clone());
        debug!("Running failure handler for: {}", error);
        let handler_ctx = Arc::clone(&ctx);
        let observed = error.clone();
        let result = match guarded(async move { handler(handler_ctx, observed).await }).await {
            Ok(_) => Err(error),
            Err(replacement) => {
                warn!("Failure handler failed: {}", replacement);
                Err(replacement)
            }
        };
        Flow::from_parts(ctx, config, result)
    }

    /// Replaces a failure with whatever `handler` returns.
    ///
    /// The failure is recorded as the context's current failure, then the
    /// handler's result (success or a new failure) becomes the chain's
    /// result. The recovered value is not stored. Successful flows pass
    /// through without running the handler.
    pub async fn recover<F, Fut>(self, handler: F) -> Flow<T>
    where
        F: FnOnce(Arc<Context>, WorkflowError) -> Fut,
        Fut: Future<Output = Result<T, WorkflowError>>,
    {
        let Flow {
            result,
            ctx,
            config,
        } = self;
        let error = match result {
            Ok(value) => return Flow::from_parts(ctx, config, Ok(value)),
            Err(e) => e,
        };

        ctx.set_current_failure(error.clone());
        info!("Recovering from failure: {}", error);
        let handler_ctx = Arc::clone(&ctx);
        let result = guarded(async move { handler(handler_ctx, error).await }).await;
        if let Err(e) = &result {
            warn!("Recovery failed: {}", e);
        }
        Flow::from_parts(ctx, config, result)
    }

    /// Terminal extraction of a `U`.
    ///
    /// Resolution order, first match wins:
    /// 1. the context holds a `U`: that value, even if the chain failed;
    /// 2. the chain failed: that failure;
    /// 3. a catch or recover recorded a failure: that failure;
    /// 4. otherwise [`WorkflowError::DeadEnd`].
    pub fn end<U: Value>(self) -> Flow<U> {
        let Flow {
            result,
            ctx,
            config,
        } = self;

        let result = if let Some(value) = ctx.find::<U>() {
            Ok(value)
        } else if let Err(e) = result {
            Err(e)
        } else if let Some(e) = ctx.current_failure() {
            Err(e)
        } else {
            warn!("Dead-end: no failure and no '{}' in context", type_name::<U>());
            Err(WorkflowError::DeadEnd {
                type_name: type_name::<U>(),
            })
        };
        Flow::from_parts(ctx, config, result)
    }
}

/// A spawned fork branch that is aborted when dropped.
///
/// A fork dropped mid-flight drops its branches, and with them any forks
/// they started in turn.
struct Branch<O>(JoinHandle<O>);

impl<O: Send + 'static> Branch<O> {
    fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = O> + Send + 'static,
    {
        Self(tokio::spawn(fut))
    }
}

impl<O> Branch<O> {
    fn abort(&self) {
        self.0.abort();
    }
}

impl<O> Future for Branch<O> {
    type Output = Result<O, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<O> Drop for Branch<O> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn branch<I: Value, S: Step>(flow: Flow<I>, step: S) -> Result<S::Output, WorkflowError> {
    flow.then_step(step).await.into_result()
}

async fn fail_fast<O, P>(
    first: Branch<Result<O, WorkflowError>>,
    second: Branch<Result<P, WorkflowError>>,
) -> Result<(O, P), WorkflowError> {
    // `select` polls `first` before `second`, so a tie goes to `first`.
    match future::select(first, second).await {
        Either::Left((done, second)) => match joined(done) {
            Ok(a) => join_pair(Ok(a), joined(second.await)),
            Err(e) => {
                cancel(second).await;
                Err(e)
            }
        },
        Either::Right((done, first)) => match joined(done) {
            Ok(b) => join_pair(joined(first.await), Ok(b)),
            Err(e) => {
                cancel(first).await;
                Err(e)
            }
        },
    }
}

async fn cancel<O>(task: Branch<O>) {
    task.abort();
    // Wait for the abort to land so no branch outlives the fork.
    if task.await.is_ok() {
        debug!("Branch finished before it could be cancelled");
    } else {
        warn!("Branch cancelled after sibling failure");
    }
}

fn join_pair<O, P>(
    first: Result<O, WorkflowError>,
    second: Result<P, WorkflowError>,
) -> Result<(O, P), WorkflowError> {
    match (first, second) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(e), _) => Err(e),
        (_, Err(e)) => Err(e),
    }
}

fn joined<O>(outcome: Result<Result<O, WorkflowError>, JoinError>) -> Result<O, WorkflowError> {
    match outcome {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(WorkflowError::Panicked {
            message: panic_message(e.into_panic().as_ref()),
        }),
        Err(_) => Err(WorkflowError::Cancelled),
    }
}

/// Awaits `fut`, turning a panic into [`WorkflowError::Panicked`].
pub(crate) async fn guarded<O, Fut>(fut: Fut) -> Result<O, WorkflowError>
where
    Fut: Future<Output = Result<O, WorkflowError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(WorkflowError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
