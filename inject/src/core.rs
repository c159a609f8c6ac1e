//! Core, non-public data structures shared by injectables and containers.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A type-erased, shareable resolved value.
pub type Value = Arc<dyn Any + Send + Sync>;

thread_local! {
  // The (instance, name) pairs currently being resolved on this thread.
  // A repeated entry means the resolution chain loops back on itself.
  static RESOLVING_STACK: RefCell<HashSet<ResolutionKey>> = RefCell::new(HashSet::new());
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct ResolutionKey {
  pub(crate) instance: u64,
  pub(crate) name: String,
}

impl fmt::Debug for ResolutionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Key(Instance({}), Name({}))", self.instance, self.name)
  }
}

/// An RAII guard marking one injectable of one instance as "being resolved".
///
/// `enter` returns `None` when the same key is already on this thread's stack,
/// which is how circular dependencies are reported as errors instead of
/// re-entering a once-cell that is still initializing.
pub(crate) struct ResolutionGuard {
  key: ResolutionKey,
}

impl ResolutionGuard {
  pub(crate) fn enter(instance: u64, name: &str) -> Option<Self> {
    let key = ResolutionKey {
      instance,
      name: name.to_owned(),
    };
    let fresh = RESOLVING_STACK.with(|stack| stack.borrow_mut().insert(key.clone()));
    fresh.then_some(Self { key })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLVING_STACK.with(|stack| {
      stack.borrow_mut().remove(&self.key);
    });
  }
}
