use fibre_ttl::{CacheBuilder, TimedCache};
use std::collections::HashMap;
use std::time::Duration;

const LONG_TTL: Duration = Duration::from_secs(60);

#[test]
fn test_iter_empty_cache() {
  let cache = TimedCache::<i32, String>::new(LONG_TTL);
  assert_eq!(cache.iter().count(), 0);
  assert!(cache.iter().next().is_none());
}

#[test]
fn test_iter_yields_every_entry() {
  let cache = CacheBuilder::new(LONG_TTL).shards(4).build().unwrap();
  for i in 0..100 {
    cache.set(i, format!("value{i}"));
  }

  let items: HashMap<i32, String> = cache
    .iter()
    .map(|(key, value)| (key, (*value).clone()))
    .collect();

  assert_eq!(items.len(), 100);
  for i in 0..100 {
    assert_eq!(items.get(&i), Some(&format!("value{i}")));
  }
}

#[test]
fn test_iter_is_reiterable_and_reflects_current_state() {
  let cache = TimedCache::<i32, i32>::new(LONG_TTL);
  cache.set(1, 1);
  cache.set(2, 2);
  assert_eq!(cache.iter().count(), 2);

  cache.delete(&1);
  cache.set(3, 3);

  let mut keys: Vec<i32> = cache.iter().map(|(key, _)| key).collect();
  keys.sort_unstable();
  assert_eq!(keys, vec![2, 3]);
}

#[test]
fn test_iter_does_not_touch_metrics_or_timers() {
  let cache = TimedCache::<i32, i32>::new(LONG_TTL);
  cache.set(1, 1);

  for (key, value) in &cache {
    assert_eq!(key, 1);
    assert_eq!(*value, 1);
  }

  let metrics = cache.metrics();
  assert_eq!(metrics.hits, 0);
  assert_eq!(metrics.renewals, 0);
  assert_eq!(cache.timer_count(), 1);
}

#[test]
fn test_iter_tolerates_mutation_while_iterating() {
  let cache = CacheBuilder::new(LONG_TTL).shards(8).build().unwrap();
  for i in 0..64 {
    cache.set(i, i);
  }

  // Deleting from inside the loop must neither deadlock nor panic.
  let mut seen = 0;
  for (key, _) in cache.iter() {
    cache.delete(&key);
    seen += 1;
  }

  assert_eq!(seen, 64);
  assert!(cache.is_empty());
}
