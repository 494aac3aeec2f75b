use crate::entry::CacheEntry;
use crate::task::timer::{TimerHandle, TimerWheel};

use core::fmt;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<Q: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &Q) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// One partition of the cache: the entries and the timers that expire them.
///
/// Both live under the same lock so that cancelling a timer and replacing or
/// removing its entry is a single step from every other thread's view.
pub(crate) struct Shard<K, V, H> {
  pub(crate) map: HashMap<K, CacheEntry<V>, H>,
  pub(crate) wheel: TimerWheel<K>,
}

impl<K, V, H> Shard<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  fn new(hasher: H, wheel_size: usize, tick_duration: Duration) -> Self {
    Self {
      map: HashMap::with_hasher(hasher),
      wheel: TimerWheel::new(wheel_size, tick_duration),
    }
  }

  /// Inserts or replaces `key`, arming a fresh timer for `ttl`.
  ///
  /// Returns the replaced value, if any. The old timer is cancelled before
  /// anything else is touched.
  pub(crate) fn insert(&mut self, key: K, value: Arc<V>, ttl: Duration, now: Instant) -> Option<Arc<V>> {
    if let Some(entry) = self.map.get_mut(&key) {
      self.wheel.cancel(entry.timer);
      entry.timer = self.wheel.schedule(key, ttl, now);
      return Some(mem::replace(&mut entry.value, value));
    }

    let timer = self.wheel.schedule(key.clone(), ttl, now);
    self.map.insert(key, CacheEntry::new(value, timer));
    None
  }

  /// Re-arms the timer of an existing entry and returns its value.
  pub(crate) fn renew<Q>(&mut self, key: &Q, ttl: Duration, now: Instant) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let current = self.map.get(key)?.timer;
    let timer = match self.wheel.reschedule(current, ttl, now) {
      Some(timer) => timer,
      None => {
        let (stored_key, _) = self.map.get_key_value(key)?;
        self.wheel.schedule(stored_key.clone(), ttl, now)
      }
    };

    let entry = self.map.get_mut(key)?;
    entry.timer = timer;
    Some(entry.value())
  }

  /// Cancels the entry's timer and removes the entry.
  ///
  /// When `expected` is set, the entry is only removed if it is still owned by
  /// that timer. A timer that lost a race with a replacement therefore can
  /// never remove the newer entry.
  pub(crate) fn remove_entry<Q>(&mut self, key: &Q, expected: Option<TimerHandle>) -> Option<(K, Arc<V>)>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let timer = self.map.get(key)?.timer;
    if expected.is_some_and(|handle| handle != timer) {
      return None;
    }

    self.wheel.cancel(timer);
    self
      .map
      .remove_entry(key)
      .map(|(key, entry)| (key, entry.value))
  }

  /// Advances the wheel and removes every entry whose timer fired.
  pub(crate) fn expire(&mut self, ticks: u64, now: Instant) -> Vec<(K, Arc<V>)> {
    self
      .wheel
      .advance(ticks, now)
      .into_iter()
      .filter_map(|(handle, key)| self.remove_entry(&key, Some(handle)))
      .collect()
  }

  /// Cancels every timer and moves all entries out of the shard.
  ///
  /// The entries are returned so the caller can drop the values after the
  /// shard lock is released.
  pub(crate) fn take_all(&mut self) -> HashMap<K, CacheEntry<V>, H> {
    self.wheel.clear();
    let empty = HashMap::with_hasher(self.map.hasher().clone());
    mem::replace(&mut self.map, empty)
  }
}

/// A cache store that is partitioned into multiple, independently locked shards.
///
/// This design allows for high concurrency by ensuring that operations on
/// different keys are unlikely to contend for the same lock.
pub(crate) struct ShardedStore<K, V, H> {
  pub(crate) shards: Box<[CachePadded<RwLock<Shard<K, V, H>>>]>,
  pub(crate) hasher: H,
}

impl<K, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  /// Creates a new `ShardedStore`. `num_shards` must be a non-zero power of two.
  pub(crate) fn new(num_shards: usize, hasher: H, wheel_size: usize, tick_duration: Duration) -> Self {
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      let shard = Shard::new(hasher.clone(), wheel_size, tick_duration);
      shards.push(CachePadded::new(RwLock::new(shard)));
    }

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  /// Returns the lock guarding the shard that owns `key`.
  #[inline]
  pub(crate) fn shard_for<Q>(&self, key: &Q) -> &RwLock<Shard<K, V, H>>
  where
    K: Borrow<Q>,
    Q: Hash + ?Sized,
  {
    let hash = hash_key(&self.hasher, key);
    // The shard count is a power of two, validated by the builder.
    let index = hash as usize & (self.shards.len() - 1);
    &self.shards[index]
  }
}
