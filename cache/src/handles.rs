use crate::builder::CacheBuilder;
use crate::iter::Iter;
use crate::listener::{EvictionListener, EvictionReason, SubscriptionId};
use crate::metrics::MetricsSnapshot;
use crate::shared::CacheShared;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

/// Controls whether a read re-arms the entry's expiration timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Renewal {
  /// Read only. The entry keeps its current deadline.
  #[default]
  None,
  /// Restart the countdown using the cache's default TTL.
  Default,
  /// Restart the countdown using the given duration.
  With(Duration),
}

/// A thread-safe, in-memory key-value store whose entries expire.
///
/// Every entry is paired with exactly one armed timer. When the timer fires,
/// the entry is removed exactly as if `delete` had been called, and every
/// registered [`EvictionListener`] is told about it.
///
/// Dropping the cache cancels all pending timers and stops its background
/// thread. Share it between threads with an `Arc`.
#[derive(Debug)]
pub struct TimedCache<K, V, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K, V> TimedCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Creates a cache whose entries live for `default_ttl` unless an operation
  /// supplies its own duration.
  ///
  /// A zero duration is valid and means "expire on the next timer tick"; the
  /// same holds for every per-operation duration.
  pub fn new(default_ttl: Duration) -> Self {
    CacheBuilder::new(default_ttl).assemble()
  }

  /// Returns a builder for a cache with the given default TTL.
  pub fn builder(default_ttl: Duration) -> CacheBuilder<K, V> {
    CacheBuilder::new(default_ttl)
  }
}

impl<K, V, H> TimedCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  /// The TTL used when an operation does not supply one.
  #[inline]
  pub fn default_ttl(&self) -> Duration {
    self.shared.time_to_live
  }

  /// The number of entries in the cache.
  #[inline]
  pub fn len(&self) -> usize {
    self.shared.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.shared.is_empty()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Inserts or replaces `key`, expiring it after the default TTL.
  pub fn set(&self, key: K, value: V) {
    self.set_with_ttl(key, value, self.shared.time_to_live);
  }

  /// Inserts or replaces `key`, expiring it after `ttl`.
  ///
  /// If the key already exists its pending timer is cancelled first, so the
  /// old timer can never remove the new value. The value and the countdown
  /// are reset unconditionally, even if the value did not change.
  pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
    let value = Arc::new(value);
    let now = Instant::now();

    let replaced = {
      let mut shard = self.shared.store.shard_for(&key).write();
      let replaced = shard.insert(key, value, ttl, now);
      // Counted under the shard lock so `clear` never sees an uncounted entry.
      if replaced.is_none() {
        self.shared.on_new_entry();
      }
      replaced
    };

    if replaced.is_some() {
      self.shared.metrics.updates.fetch_add(1, Ordering::Relaxed);
    }
  }

  /// Returns the value stored at `key` without touching its timer.
  pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let value = self
      .shared
      .store
      .shard_for(key)
      .read()
      .map
      .get(key)
      .map(|entry| entry.value());

    match value {
      Some(_) => self.shared.metrics.record_hit(),
      None => self.shared.metrics.record_miss(),
    }
    value
  }

  /// Returns the value stored at `key`, renewing its timer as `renewal` says.
  ///
  /// A missing key yields `None` and has no side effects.
  pub fn get_with<Q>(&self, key: &Q, renewal: Renewal) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    match renewal {
      Renewal::None => self.get(key),
      Renewal::Default => self.get_and_renew(key),
      Renewal::With(ttl) => self.get_and_renew_with(key, ttl),
    }
  }

  /// Returns the value stored at `key` and restarts its countdown from the
  /// default TTL.
  pub fn get_and_renew<Q>(&self, key: &Q) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.get_and_renew_with(key, self.shared.time_to_live)
  }

  /// Returns the value stored at `key` and restarts its countdown from `ttl`.
  pub fn get_and_renew_with<Q>(&self, key: &Q, ttl: Duration) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let value = self.renew(key, ttl);
    match value {
      Some(_) => self.shared.metrics.record_hit(),
      None => self.shared.metrics.record_miss(),
    }
    value
  }

  /// Returns whether `key` is present.
  ///
  /// This is a peek: it never renews the entry or counts as a hit or miss.
  pub fn has<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.shared.store.shard_for(key).read().map.contains_key(key)
  }

  /// Restarts the countdown of `key` from the default TTL without reading it.
  ///
  /// Returns whether the key existed.
  pub fn restart<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.restart_with(key, self.shared.time_to_live)
  }

  /// Restarts the countdown of `key` from `ttl` without reading it.
  ///
  /// Returns whether the key existed.
  pub fn restart_with<Q>(&self, key: &Q, ttl: Duration) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.renew(key, ttl).is_some()
  }

  /// Removes `key`, cancelling its timer.
  ///
  /// If an entry was present, every listener is notified with
  /// [`EvictionReason::Removed`] before this returns. Returns whether an
  /// entry was removed.
  pub fn delete<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let removed = self
      .shared
      .store
      .shard_for(key)
      .write()
      .remove_entry(key, None);

    match removed {
      Some((key, value)) => {
        self.shared.evict(key, value, EvictionReason::Removed);
        true
      }
      None => false,
    }
  }

  /// Removes every entry and cancels every pending timer.
  ///
  /// **No eviction notifications are emitted.** Clearing is a silent reset,
  /// unlike `delete` and expiry; listeners that track contents must handle
  /// it separately.
  pub fn clear(&self) {
    // Acquire write locks for ALL shards. This is a "stop-the-world" operation.
    let mut guards = self
      .shared
      .store
      .shards
      .iter()
      .map(|shard| shard.write())
      .collect::<Vec<_>>();

    let taken = guards
      .iter_mut()
      .map(|guard| guard.take_all())
      .collect::<Vec<_>>();
    let removed: usize = taken.iter().map(|map| map.len()).sum();
    self
      .shared
      .metrics
      .current_size
      .fetch_sub(removed, Ordering::Relaxed);
    drop(guards);

    self.shared.metrics.clears.fetch_add(1, Ordering::Relaxed);
    debug!(removed, "cache cleared");
    // Values are dropped here, outside every shard lock.
    drop(taken);
  }

  /// Returns an iterator over the `(key, value)` pairs in the cache.
  ///
  /// Iterating never renews an entry. See [`Iter`] for how concurrent
  /// modification is observed.
  pub fn iter(&self) -> Iter<'_, K, V, H> {
    Iter::new(self)
  }

  /// Registers a closure to be called whenever an entry is deleted or expires.
  pub fn on_delete<F>(&self, listener: F) -> SubscriptionId
  where
    F: Fn(&K, &Arc<V>, EvictionReason) + Send + Sync + 'static,
  {
    self.subscribe(listener)
  }

  /// Registers an [`EvictionListener`].
  pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
  where
    L: EvictionListener<K, V> + 'static,
  {
    self.shared.listeners.subscribe(Arc::new(listener))
  }

  /// Removes a listener. Returns whether it was registered.
  pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
    self.shared.listeners.unsubscribe(id)
  }

  /// The number of armed timers across all shards.
  #[doc(hidden)]
  pub fn timer_count(&self) -> usize {
    self
      .shared
      .store
      .shards
      .iter()
      .map(|shard| shard.read().wheel.len())
      .sum()
  }

  fn renew<Q>(&self, key: &Q, ttl: Duration) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let value = self
      .shared
      .store
      .shard_for(key)
      .write()
      .renew(key, ttl, Instant::now());

    if value.is_some() {
      self.shared.metrics.record_renewal();
    }
    value
  }
}

impl<'a, K, V, H> IntoIterator for &'a TimedCache<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  type Item = (K, Arc<V>);
  type IntoIter = Iter<'a, K, V, H>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}
