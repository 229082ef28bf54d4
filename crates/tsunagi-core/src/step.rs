//! Step trait and the stock step constructions.

use crate::context::Context;
use crate::error::WorkflowError;
use crate::value::Value;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A unit of work over the shared [`Context`].
///
/// A step takes no input of its own: whatever it needs it reads from the
/// context, and its output is handed back to the chain, which stores it.
/// Steps are immutable and may be executed any number of times.
///
/// Implement this trait for reusable steps; for one-off logic use [`step`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tsunagi_core::{Context, Step, WorkflowError};
///
/// #[derive(Debug, Clone)]
/// struct Greeting(String);
///
/// struct GreetStep;
///
/// #[async_trait]
/// impl Step for GreetStep {
///     type Output = Greeting;
///
///     async fn execute(&self, ctx: Arc<Context>) -> Result<Greeting, WorkflowError> {
///         let name = ctx.get::<String>()?;
///         Ok(Greeting(format!("Hello, {name}!")))
///     }
/// }
///
/// let ctx = Arc::new(Context::new());
/// ctx.store("Tsunagi".to_string());
/// let greeting = tokio_test::block_on(GreetStep.execute(ctx)).unwrap();
/// assert_eq!(greeting.0, "Hello, Tsunagi!");
/// ```
#[async_trait]
pub trait Step: Send + Sync {
    /// The value this step produces.
    type Output: Value;

    /// Runs the step against `ctx`.
    ///
    /// # Errors
    ///
    /// Any error returned here becomes the failure of the chain at this
    /// point.
    async fn execute(&self, ctx: Arc<Context>) -> Result<Self::Output, WorkflowError>;
}

#[async_trait]
impl<S> Step for Arc<S>
where
    S: Step + ?Sized,
{
    type Output = S::Output;

    async fn execute(&self, ctx: Arc<Context>) -> Result<Self::Output, WorkflowError> {
        (**self).execute(ctx).await
    }
}

/// A step backed by an async closure. Built with [`step`].
#[derive(Clone)]
pub struct FnStep<F> {
    f: F,
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").finish_non_exhaustive()
    }
}

impl<F> FnStep<F> {
    /// Wraps `f` as a step.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut, O> Step for FnStep<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, WorkflowError>> + Send + 'static,
    O: Value,
{
    type Output = O;

    async fn execute(&self, ctx: Arc<Context>) -> Result<O, WorkflowError> {
        (self.f)(ctx).await
    }
}

/// Builds a step from an async closure over the context.
///
/// ```
/// use std::sync::Arc;
/// use tsunagi_core::{step, Context, Step};
///
/// let double = step(|ctx| async move { Ok(ctx.get::<u32>()? * 2) });
///
/// let ctx = Arc::new(Context::new());
/// ctx.store(21u32);
/// assert_eq!(tokio_test::block_on(double.execute(ctx)).unwrap(), 42);
/// ```
pub fn step<F, Fut, O>(f: F) -> FnStep<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, WorkflowError>> + Send + 'static,
    O: Value,
{
    FnStep::new(f)
}

type Writer = Arc<dyn Fn(&Context) + Send + Sync>;

/// A step that stores fixed values into the context, in order, and returns
/// the last one.
///
/// ```
/// use std::sync::Arc;
/// use tsunagi_core::{seed, Context, Seed, Step};
///
/// let ctx = Arc::new(Context::new());
///
/// // Same-typed values: each overwrites the previous one.
/// let out = tokio_test::block_on(seed(["step1", "step2"]).execute(ctx.clone())).unwrap();
/// assert_eq!(out, "step2");
///
/// // Mixed types: every value keeps its own slot.
/// let mixed = Seed::value(3u8).with(true).with("done".to_string());
/// let out = tokio_test::block_on(mixed.execute(ctx.clone())).unwrap();
/// assert_eq!(out, "done");
/// assert_eq!(ctx.get::<u8>().ok(), Some(3));
/// assert_eq!(ctx.get::<bool>().ok(), Some(true));
/// ```
pub struct Seed<T> {
    writers: Vec<Writer>,
    last: Option<T>,
}

impl<T: Clone> Clone for Seed<T> {
    fn clone(&self) -> Self {
        Self {
            writers: self.writers.clone(),
            last: self.last.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Seed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("values", &self.writers.len())
            .field("last", &self.last)
            .finish()
    }
}

impl<T: Value> Seed<T> {
    /// Creates a seed storing every value of `values` in order.
    pub fn new(values: impl IntoIterator<Item = T>) -> Self {
        let mut seed = Self {
            writers: Vec::new(),
            last: None,
        };
        for value in values {
            seed.push(value);
        }
        seed
    }

    /// Creates a seed storing a single value.
    pub fn value(value: T) -> Self {
        Self::new([value])
    }

    /// Appends `value`, which becomes the seed's output.
    pub fn with<U: Value>(self, value: U) -> Seed<U> {
        let mut next = Seed {
            writers: self.writers,
            last: None,
        };
        next.push(value);
        next
    }

    /// Returns the number of values this seed stores.
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// Returns `true` if the seed stores nothing.
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    fn push(&mut self, value: T) {
        let stored = value.clone();
        self.writers.push(Arc::new(move |ctx: &Context| {
            ctx.store(stored.clone());
        }));
        self.last = Some(value);
    }
}

#[async_trait]
impl<T: Value> Step for Seed<T> {
    type Output = T;

    async fn execute(&self, ctx: Arc<Context>) -> Result<T, WorkflowError> {
        for write in &self.writers {
            write(&ctx);
        }
        self.last.clone().ok_or(WorkflowError::EmptySeed)
    }
}

/// Builds a [`Seed`] from same-typed values.
pub fn seed<T: Value>(values: impl IntoIterator<Item = T>) -> Seed<T> {
    Seed::new(values)
}

/// Two steps to be run side by side by the fork combinator.
#[derive(Debug, Clone)]
pub struct PairSteps<A, B> {
    /// The step whose output and failure take precedence.
    pub first: A,
    /// The other step.
    pub second: B,
}

impl<A: Step, B: Step> PairSteps<A, B> {
    /// Pairs `first` with `second`.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

/// Extension methods available on every [`Step`].
pub trait StepExt: Step + Sized {
    /// Pairs this step with `other` for a fork.
    fn and<S: Step>(self, other: S) -> PairSteps<Self, S> {
        PairSteps::new(self, other)
    }
}

impl<S: Step> StepExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::block_on;

    struct CountingStep {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Step for CountingStep {
        type Output = u32;

        async fn execute(&self, ctx: Arc<Context>) -> Result<u32, WorkflowError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            ctx.store(format!("call-{n}"));
            Ok(n)
        }
    }

    #[test]
    fn test_custom_step_execution() {
        let calls = Arc::new(AtomicU32::new(0));
        let step = CountingStep {
            calls: calls.clone(),
        };
        let ctx = Arc::new(Context::new());

        assert_eq!(block_on(step.execute(ctx.clone())).unwrap(), 1);
        assert_eq!(block_on(step.execute(ctx.clone())).unwrap(), 2);
        assert_eq!(ctx.get::<String>().unwrap(), "call-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fn_step_reads_context() {
        let ctx = Arc::new(Context::new());
        ctx.store(10i64);

        let negate = step(|ctx| async move { Ok(-ctx.get::<i64>()?) });
        assert_eq!(block_on(negate.execute(ctx)).unwrap(), -10);
    }

    #[test]
    fn test_fn_step_error() {
        let ctx = Arc::new(Context::new());
        let missing = step(|ctx| async move { ctx.get::<u16>() });

        let err = block_on(missing.execute(ctx)).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
    }

    #[test]
    fn test_seed_stores_in_order() {
        let ctx = Arc::new(Context::new());
        let values = seed(["value1", "value2", "value3"]);
        assert_eq!(values.len(), 3);

        assert_eq!(block_on(values.execute(ctx.clone())).unwrap(), "value3");
        assert_eq!(ctx.get::<&str>().unwrap(), "value3");
    }

    #[test]
    fn test_seed_mixed_types() {
        let ctx = Arc::new(Context::new());
        let values = Seed::value(1u8).with(2u16).with(3u8);

        assert_eq!(block_on(values.execute(ctx.clone())).unwrap(), 3u8);
        assert_eq!(ctx.get::<u8>().unwrap(), 3);
        assert_eq!(ctx.get::<u16>().unwrap(), 2);
    }

    #[test]
    fn test_empty_seed_fails() {
        let ctx = Arc::new(Context::new());
        let empty = seed(Vec::<String>::new());
        assert!(empty.is_empty());

        let err = block_on(empty.execute(ctx.clone())).unwrap_err();
        assert!(matches!(err, WorkflowError::EmptySeed));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_shared_step() {
        let ctx = Arc::new(Context::new());
        let shared = Arc::new(seed([5u64]));
        let pair = shared.clone().and(shared);

        assert_eq!(block_on(pair.first.execute(ctx.clone())).unwrap(), 5);
        assert_eq!(block_on(pair.second.execute(ctx)).unwrap(), 5);
    }
}
