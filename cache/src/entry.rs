use crate::task::timer::TimerHandle;

use std::sync::Arc;

/// A container for a value in the cache, paired with the timer that will
/// evict it.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  /// The user's value, wrapped in an Arc for shared ownership.
  pub(crate) value: Arc<V>,
  /// The armed expiration timer. Every entry owns exactly one.
  pub(crate) timer: TimerHandle,
}

impl<V> CacheEntry<V> {
  #[inline]
  pub(crate) fn new(value: Arc<V>, timer: TimerHandle) -> Self {
    Self { value, timer }
  }

  /// Returns a clone of the `Arc` containing the value.
  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.clone()
  }
}
