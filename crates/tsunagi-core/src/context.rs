//! Shared, type-keyed execution context.

use crate::error::WorkflowError;
use crate::value::Value;
use dashmap::DashMap;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Slot {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Execution context shared by every step of a chain.
///
/// Holds at most one value per type: storing a second `String` replaces the
/// first. Lookups are by exact type, so a `u32` is never returned for a
/// request of `u64`, and a value stored as `Box<dyn Error>` is only found
/// under `Box<dyn Error>`.
///
/// Every operation takes `&self` and is safe to call from concurrent
/// branches. Two branches storing the same type at the same time both
/// succeed, but which one is left in the slot is unspecified.
///
/// Besides the values, the context keeps a single failure slot that the
/// catch and recover combinators write to.
///
/// # Examples
///
/// ```
/// use tsunagi_core::Context;
///
/// let ctx = Context::new();
///
/// ctx.store(42u64);
/// ctx.store("Alice".to_string());
///
/// assert_eq!(ctx.get::<u64>().ok(), Some(42));
/// assert_eq!(ctx.get::<String>().ok(), Some("Alice".to_string()));
///
/// // Exact type only
/// assert!(!ctx.has::<u32>());
///
/// // Last write wins
/// ctx.store("Bob".to_string());
/// assert_eq!(ctx.get::<String>().ok(), Some("Bob".to_string()));
/// ```
pub struct Context {
    slots: DashMap<TypeId, Slot>,
    current_failure: RwLock<Option<WorkflowError>>,
    started_at: Instant,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("types", &self.type_names())
            .field("current_failure", &self.current_failure())
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            current_failure: RwLock::new(self.current_failure()),
            started_at: self.started_at,
        }
    }
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            current_failure: RwLock::new(None),
            started_at: Instant::now(),
        }
    }

    /// Stores `value` under its type, replacing any earlier value of that
    /// type, and hands the same value back.
    pub fn store<T: Value>(&self, value: T) -> T {
        self.slots.insert(
            TypeId::of::<T>(),
            Slot {
                value: Arc::new(value.clone()),
                type_name: type_name::<T>(),
            },
        );
        value
    }

    /// Returns a copy of the stored `T`.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::NotFound`] if no `T` was ever stored.
    pub fn get<T: Value>(&self) -> Result<T, WorkflowError> {
        self.find::<T>().ok_or(WorkflowError::NotFound {
            type_name: type_name::<T>(),
        })
    }

    /// Returns a copy of the stored `T`, or `None`.
    pub fn find<T: Value>(&self) -> Option<T> {
        // Clone the Arc out first so the shard lock is released before
        // user `Clone` code runs.
        let value = self
            .slots
            .get(&TypeId::of::<T>())
            .map(|slot| Arc::clone(&slot.value))?;
        value.downcast_ref::<T>().cloned()
    }

    /// Returns `true` if a `T` has been stored.
    pub fn has<T: Any>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    /// Returns an independent copy of this context.
    ///
    /// Stores made on either copy afterwards are invisible to the other.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Returns the failure last recorded by a catch or recover combinator.
    pub fn current_failure(&self) -> Option<WorkflowError> {
        self.current_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records `error` as the current failure.
    pub fn set_current_failure(&self, error: WorkflowError) {
        *self
            .current_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Returns the names of all stored types, in no particular order.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|entry| entry.type_name).collect()
    }

    /// Returns the number of stored types.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the time elapsed since the context was created.
    ///
    /// Snapshots share the creation time of their origin.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct UserId(u64);

    #[test]
    fn test_store_then_get() {
        let ctx = Context::new();

        assert_eq!(ctx.store(7i32), 7);
        ctx.store("hello".to_string());
        ctx.store(UserId(12));

        assert_eq!(ctx.get::<i32>().ok(), Some(7));
        assert_eq!(ctx.get::<String>().ok(), Some("hello".to_string()));
        assert_eq!(ctx.get::<UserId>().ok(), Some(UserId(12)));
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn test_last_write_wins() {
        let ctx = Context::new();
        ctx.store("first".to_string());
        ctx.store("second".to_string());

        assert_eq!(ctx.get::<String>().ok(), Some("second".to_string()));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_get_missing_type() {
        let ctx = Context::new();
        ctx.store(1u32);

        let err = ctx.get::<u64>().unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { type_name } if type_name == "u64"));
        assert_eq!(ctx.find::<u64>(), None);
    }

    #[test]
    fn test_has() {
        let ctx = Context::new();
        assert!(!ctx.has::<String>());
        ctx.store(String::new());
        assert!(ctx.has::<String>());
        assert!(!ctx.has::<&'static str>());
    }

    #[test]
    fn test_keyed_by_static_type() {
        let ctx = Context::new();
        let boxed: Box<dyn Fn() -> u8 + Send + Sync> = Box::new(|| 1);
        let shared: Arc<dyn Fn() -> u8 + Send + Sync> = Arc::from(boxed);
        ctx.store(shared);

        assert!(ctx.has::<Arc<dyn Fn() -> u8 + Send + Sync>>());
        assert!(!ctx.has::<u8>());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let ctx = Context::new();
        ctx.store("origin".to_string());

        let copy = ctx.snapshot();
        assert_eq!(copy.get::<String>().ok(), Some("origin".to_string()));

        copy.store("copy".to_string());
        copy.store(5u8);
        assert_eq!(ctx.get::<String>().ok(), Some("origin".to_string()));
        assert!(!ctx.has::<u8>());

        ctx.store(true);
        assert!(!copy.has::<bool>());
    }

    #[test]
    fn test_current_failure() {
        let ctx = Context::new();
        assert!(ctx.current_failure().is_none());

        ctx.set_current_failure(WorkflowError::step_error("first"));
        let copy = ctx.snapshot();
        ctx.set_current_failure(WorkflowError::step_error("second"));

        assert_eq!(
            ctx.current_failure().and_then(|e| e.message()).as_deref(),
            Some("second")
        );
        assert_eq!(
            copy.current_failure().and_then(|e| e.message()).as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_concurrent_stores_keep_one_writer() {
        let ctx = Arc::new(Context::new());
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || {
                    ctx.store(i);
                    ctx.store(format!("writer-{i}"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let winner = ctx.get::<u64>().unwrap();
        assert!(winner < 8);
        assert!(ctx.get::<String>().unwrap().starts_with("writer-"));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_type_names() {
        let ctx = Context::new();
        ctx.store(1u8);
        let names = ctx.type_names();
        assert_eq!(names, vec!["u8"]);
        assert!(format!("{ctx:?}").contains("u8"));
    }
}
