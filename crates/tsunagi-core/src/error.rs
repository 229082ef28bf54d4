//! Workflow error types.

use std::sync::Arc;
use thiserror::Error;

/// Errors carried by the failure side of every chained `Result`.
///
/// The type is `Clone` because a single failure is routinely observed in
/// more than one place: it is handed to both branches of a fork, recorded in
/// the context's failure slot, and still propagated down the chain.
///
/// # Non-Exhaustive
///
/// New variants may be added in minor releases. Always include a wildcard
/// arm when matching:
///
/// ```
/// use tsunagi_core::WorkflowError;
///
/// fn describe(error: &WorkflowError) -> String {
///     match error {
///         WorkflowError::StepError { message } => {
///             format!("step failed: {}", message.as_deref().unwrap_or("-"))
///         }
///         WorkflowError::DeadEnd { type_name } => {
///             format!("nothing produced a {type_name}")
///         }
///         other => other.to_string(),
///     }
/// }
///
/// assert_eq!(describe(&WorkflowError::step_error("boom")), "step failed: boom");
/// ```
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum WorkflowError {
    /// A step body reported a failure.
    #[error("Step failed: {}", .message.as_deref().unwrap_or("<no message>"))]
    StepError {
        /// Caller supplied message, if any.
        message: Option<String>,
    },

    /// A foreign error raised inside a step body.
    #[error("Step failed: {0}")]
    Source(Arc<dyn std::error::Error + Send + Sync>),

    /// `Context::get` was asked for a type that was never stored.
    #[error("No value of type `{type_name}` in context")]
    NotFound {
        /// Name of the requested type.
        type_name: &'static str,
    },

    /// The chain ended with neither a failure nor a value of the requested
    /// type. This is a construction defect in the chain, not a data failure.
    #[error("Dead-end: chain produced neither a failure nor a value of type `{type_name}`")]
    DeadEnd {
        /// Name of the type requested by `end`.
        type_name: &'static str,
    },

    /// A seed step was built without any values.
    #[error("Seed step has no values")]
    EmptySeed,

    /// A step body panicked.
    #[error("Step panicked: {message}")]
    Panicked {
        /// The panic payload, when it was a string.
        message: String,
    },

    /// A forked branch was cancelled before it completed.
    #[error("Branch cancelled before completion")]
    Cancelled,
}

impl WorkflowError {
    /// Creates a step failure with a message.
    pub fn step_error(message: impl Into<String>) -> Self {
        WorkflowError::StepError {
            message: Some(message.into()),
        }
    }

    /// Creates a step failure that carries no message.
    pub fn without_message() -> Self {
        WorkflowError::StepError { message: None }
    }

    /// Wraps any error type as a step failure.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WorkflowError::Source(Arc::new(error))
    }

    /// Returns the message a step attached to this failure.
    ///
    /// `None` only for a [`WorkflowError::StepError`] raised without one;
    /// every other variant reports its display text.
    pub fn message(&self) -> Option<String> {
        match self {
            WorkflowError::StepError { message } => message.clone(),
            WorkflowError::Source(source) => Some(source.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Returns `true` for the dead-end signal produced by `end`.
    pub fn is_dead_end(&self) -> bool {
        matches!(self, WorkflowError::DeadEnd { .. })
    }

    /// Returns `false` for errors that point at a defect in how the chain
    /// was assembled; running the same chain again cannot fix those.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            WorkflowError::DeadEnd { .. } | WorkflowError::EmptySeed | WorkflowError::NotFound { .. }
        )
    }
}
