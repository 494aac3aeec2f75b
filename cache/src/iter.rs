//! Contains types for iterating over a cache's contents.

use crate::handles::TimedCache;

use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;
use std::sync::Arc;
use std::vec;

/// An iterator over the `(key, value)` pairs of a `TimedCache`.
///
/// The iterator is lazy: it copies out one shard at a time, holding that
/// shard's read lock only while doing so. Consuming it never renews an entry,
/// so iteration neither prevents nor delays expiry.
///
/// **Important**: the result is not a point-in-time snapshot of the whole
/// cache. Each shard is snapshotted when the iterator reaches it; entries
/// inserted into or removed from a shard that has already been visited are
/// not observed. Call [`TimedCache::iter`] again for a fresh pass.
pub struct Iter<'a, K, V, H> {
  cache: &'a TimedCache<K, V, H>,
  buffer: vec::IntoIter<(K, Arc<V>)>,
  next_shard: usize,
}

impl<'a, K, V, H> Iter<'a, K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  pub(crate) fn new(cache: &'a TimedCache<K, V, H>) -> Self {
    Self {
      cache,
      buffer: Vec::new().into_iter(),
      next_shard: 0,
    }
  }

  /// Copies the next non-empty shard into the buffer. Returns `false` once
  /// every shard has been visited.
  fn refill_buffer(&mut self) -> bool {
    let cache = self.cache;
    let shards = &cache.shared.store.shards;

    while self.next_shard < shards.len() {
      let batch = {
        let guard = shards[self.next_shard].read();
        guard
          .map
          .iter()
          .map(|(key, entry)| (key.clone(), entry.value()))
          .collect::<Vec<_>>()
      }; // Lock on shard is released here
      self.next_shard += 1;

      if !batch.is_empty() {
        self.buffer = batch.into_iter();
        return true;
      }
    }

    false
  }
}

impl<'a, K, V, H> Iterator for Iter<'a, K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  type Item = (K, Arc<V>);

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(item) = self.buffer.next() {
        return Some(item);
      }
      if !self.refill_buffer() {
        return None;
      }
    }
  }
}

impl<'a, K, V, H> FusedIterator for Iter<'a, K, V, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
}
