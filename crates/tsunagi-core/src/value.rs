//! The bound shared by everything that flows through a chain.

use std::any::Any;

/// Anything that can be stored in a [`Context`](crate::Context) and carried
/// between steps.
///
/// Blanket-implemented; there is nothing to implement by hand.
pub trait Value: Any + Clone + Send + Sync {}

impl<T> Value for T where T: Any + Clone + Send + Sync {}
