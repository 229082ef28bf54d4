//! Core traits and types for the tsunagi step combinator engine.
//!
//! This crate has no async runtime dependency. Library authors should
//! depend on it to write reusable steps; the `tsunagi` crate adds the
//! combinators that chain them.
//!
//! # Core Types
//!
//! - [`Context`] - Type-keyed store shared by every step of a chain
//! - [`Step`] - The core trait for units of work
//! - [`FnStep`] / [`step`] - Steps from async closures
//! - [`Seed`] / [`seed`] - Steps that store fixed values
//! - [`PairSteps`] - Two steps to run side by side
//! - [`WorkflowError`] - The failure type of every chain
//! - [`Value`] - Bound for anything stored or carried between steps

mod context;
mod error;
mod step;
mod value;

pub use context::Context;
pub use error::WorkflowError;
pub use step::{seed, step, FnStep, PairSteps, Seed, Step, StepExt};
pub use value::Value;
