use crate::listener::{EvictionReason, Listeners};
use crate::metrics::Metrics;
use crate::store::ShardedStore;
use crate::task::driver::Driver;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use tracing::trace;

/// The internal, thread-safe core of the cache.
pub(crate) struct CacheShared<K, V, H> {
  pub(crate) store: ShardedStore<K, V, H>,
  pub(crate) metrics: Metrics,
  pub(crate) listeners: Listeners<K, V>,
  pub(crate) time_to_live: Duration,
  // Set once, right after the core is wrapped in its `Arc`.
  pub(crate) driver: OnceCell<Driver>,
}

impl<K, V, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("store", &self.store)
      .field("time_to_live", &self.time_to_live)
      .field("listeners", &self.listeners)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K, V, H> Drop for CacheShared<K, V, H> {
  fn drop(&mut self) {
    // The timers themselves are released with the shards.
    if let Some(driver) = self.driver.take() {
      driver.stop();
    }
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.metrics.current_size.load(Ordering::Relaxed)
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Accounts for a newly stored key, waking the driver when the cache goes
  /// from empty to non-empty.
  pub(crate) fn on_new_entry(&self) {
    self.metrics.inserts.fetch_add(1, Ordering::Relaxed);
    if self.metrics.current_size.fetch_add(1, Ordering::Relaxed) == 0 {
      if let Some(driver) = self.driver.get() {
        driver.wake();
      }
    }
  }

  /// Finishes the removal of an entry that has already been taken out of its
  /// shard, with its timer cancelled.
  ///
  /// Explicit deletes and TTL expiry both end here, which is what makes the
  /// notification fire exactly once per removed entry.
  pub(crate) fn evict(&self, key: K, value: Arc<V>, reason: EvictionReason) {
    self.metrics.current_size.fetch_sub(1, Ordering::Relaxed);
    match reason {
      EvictionReason::Expired => self.metrics.evicted_by_ttl.fetch_add(1, Ordering::Relaxed),
      EvictionReason::Removed => self.metrics.removals.fetch_add(1, Ordering::Relaxed),
    };

    self.listeners.notify(&key, &value, reason);
  }

  /// Advances every shard's timer wheel by `ticks` and evicts whatever fired.
  ///
  /// Runs on the driver thread.
  pub(crate) fn expire(&self, ticks: u64, now: Instant) {
    for shard in self.store.shards.iter() {
      let expired = shard.write().expire(ticks, now);
      if expired.is_empty() {
        continue;
      }

      trace!(count = expired.len(), "evicting expired entries");
      for (key, value) in expired {
        self.evict(key, value, EvictionReason::Expired);
      }
    }
  }
}
