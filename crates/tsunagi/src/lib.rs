//! # Tsunagi (繋ぎ)
//!
//! Chain async steps through a shared, type-keyed context.
//!
//! "Tsunagi" (繋ぎ) means "joint" or "link" in Japanese: each step links to
//! the next through the values it leaves in the context.
//!
//! ## Features
//!
//! - **Type-keyed context**: one slot per type, last write wins, safe to use
//!   from concurrent branches
//! - **Short-circuiting pipe**: a failure skips every following step until
//!   it is caught or recovered
//! - **Fork/join**: run two steps side by side, with a configurable
//!   [`JoinPolicy`]
//! - **Catch and recover**: side-effect handlers and value recovery, with
//!   the last failure kept in the context
//! - **Terminal extraction**: resolve a typed output from the context or
//!   the right failure
//! - **Nested workflows**: run an inner chain on a snapshot of the context
//!
//! ## Quick Start
//!
//! ```rust
//! use tsunagi::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let output = Workflow::start("initial".to_string(), |flow| async move {
//!     flow.then_step(seed(["step1", "step2"]))
//!         .await
//!         .then(|_ctx, input| async move { Ok(format!("processed: {input}")) })
//!         .await
//! })
//! .await
//! .expect("workflow failed");
//!
//! assert_eq!(output, "processed: step2");
//! # }
//! ```
//!
//! ## Parallel Steps
//!
//! ```rust
//! use std::sync::Arc;
//! use tsunagi::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let prices = step(|ctx: Arc<Context>| async move { Ok(u64::from(ctx.get::<u32>()?) * 100) });
//! let label = step(|ctx: Arc<Context>| async move { Ok(format!("item-{}", ctx.get::<u32>()?)) });
//!
//! let (price, name) = Workflow::start(3u32, |flow| async move {
//!     flow.fork(prices.and(label)).await
//! })
//! .await
//! .expect("workflow failed");
//!
//! assert_eq!(price, 300);
//! assert_eq!(name, "item-3");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use tsunagi::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let output = Workflow::start("test".to_string(), |flow| async move {
//!     flow.then(|_ctx, _input| async move {
//!         Err::<String, _>(WorkflowError::without_message())
//!     })
//!     .await
//!     .recover(|_ctx, error| async move {
//!         Ok(format!("recovered: {}", error.message().unwrap_or_else(|| "null".into())))
//!     })
//!     .await
//! })
//! .await;
//!
//! assert_eq!(output.ok().as_deref(), Some("recovered: null"));
//! # }
//! ```

mod config;
mod flow;
mod nested;
mod workflow;

// Re-export core types
pub use tsunagi_core::*;

pub use config::{JoinPolicy, WorkflowConfig};
pub use flow::Flow;
pub use nested::{nested, subflow, Nested};
pub use workflow::Workflow;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        nested, seed, step, subflow, Context, Flow, JoinPolicy, PairSteps, Seed, Step, StepExt,
        Value, Workflow, WorkflowConfig, WorkflowError,
    };
}
