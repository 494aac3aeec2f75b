use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

/// Describes why an entry was removed from the cache.
///
/// Both causes are reported through the same notification; the reason is
/// carried as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
  /// The entry's time-to-live elapsed without renewal.
  Expired,
  /// The entry was removed with `delete`.
  Removed,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Expired => write!(f, "evicted due to expiration (TTL)"),
      EvictionReason::Removed => write!(f, "manually removed"),
    }
  }
}

/// A listener that can be registered with the cache to receive notifications
/// when entries are removed.
///
/// `on_evict` runs synchronously on the thread that performed the removal:
/// the caller's thread for `delete`, the cache's expiration thread for TTL
/// expiry. It is invoked after the cache's internal locks are released, so it
/// may call back into the cache and will observe the entry already gone.
///
/// A panic inside `on_evict` is caught and logged. It never reaches the
/// thread that removed the entry and never keeps the remaining listeners
/// from being called.
///
/// `clear` never notifies.
///
/// Any `Fn(&K, &Arc<V>, EvictionReason) + Send + Sync` closure is a listener.
pub trait EvictionListener<K, V>: Send + Sync {
  fn on_evict(&self, key: &K, value: &Arc<V>, reason: EvictionReason);
}

impl<K, V, F> EvictionListener<K, V> for F
where
  F: Fn(&K, &Arc<V>, EvictionReason) + Send + Sync,
{
  #[inline]
  fn on_evict(&self, key: &K, value: &Arc<V>, reason: EvictionReason) {
    self(key, value, reason)
  }
}

/// Identifies a registered listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Subscribers<K, V> = Arc<[(SubscriptionId, Arc<dyn EvictionListener<K, V>>)]>;

/// The set of registered listeners.
///
/// Stored copy-on-write: dispatch clones the current list and releases the
/// lock before calling anything, so listeners may subscribe or unsubscribe
/// from inside a notification.
pub(crate) struct Listeners<K, V> {
  subscribers: RwLock<Subscribers<K, V>>,
  next_id: AtomicU64,
}

impl<K, V> Listeners<K, V> {
  pub(crate) fn new() -> Self {
    Self {
      subscribers: RwLock::new(Arc::from(Vec::new())),
      next_id: AtomicU64::new(0),
    }
  }

  pub(crate) fn subscribe(&self, listener: Arc<dyn EvictionListener<K, V>>) -> SubscriptionId {
    let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let mut guard = self.subscribers.write();
    let mut next = guard.to_vec();
    next.push((id, listener));
    *guard = Arc::from(next);
    id
  }

  pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
    let mut guard = self.subscribers.write();
    if !guard.iter().any(|(existing, _)| *existing == id) {
      return false;
    }
    let next: Vec<_> = guard
      .iter()
      .filter(|(existing, _)| *existing != id)
      .cloned()
      .collect();
    *guard = Arc::from(next);
    true
  }

  pub(crate) fn len(&self) -> usize {
    self.subscribers.read().len()
  }

  /// Calls every listener registered at the time of the call, each in
  /// isolation from the others' panics.
  pub(crate) fn notify(&self, key: &K, value: &Arc<V>, reason: EvictionReason) {
    let subscribers = self.subscribers.read().clone();
    for (id, listener) in subscribers.iter() {
      let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        listener.on_evict(key, value, reason)
      }));
      if outcome.is_err() {
        error!(subscription = id.0, %reason, "eviction listener panicked");
      }
    }
  }
}

impl<K, V> fmt::Debug for Listeners<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Listeners")
      .field("count", &self.len())
      .finish()
  }
}
