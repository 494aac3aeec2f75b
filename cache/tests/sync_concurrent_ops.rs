use fibre_ttl::{CacheBuilder, TimedCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const NUM_THREADS: usize = 8;
const OPS_PER_THREAD: usize = 1000;

#[test]
fn test_concurrent_set_get_delete() {
  let cache = Arc::new(TimedCache::<usize, usize>::new(Duration::from_secs(60)));

  let handles: Vec<_> = (0..NUM_THREADS)
    .map(|t| {
      let cache = cache.clone();
      thread::spawn(move || {
        for i in 0..OPS_PER_THREAD {
          let key = t * OPS_PER_THREAD + i;
          cache.set(key, i);
          assert_eq!(cache.get(&key).as_deref(), Some(&i));
          if i % 2 == 0 {
            assert!(cache.delete(&key));
          }
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }

  let expected = NUM_THREADS * OPS_PER_THREAD / 2;
  assert_eq!(cache.len(), expected);
  assert_eq!(cache.timer_count(), expected);
  assert_eq!(cache.iter().count(), expected);
}

#[test]
fn test_concurrent_writers_on_shared_keys() {
  let cache = Arc::new(
    CacheBuilder::<usize, usize>::new(Duration::from_secs(60))
      .shards(2)
      .build()
      .unwrap(),
  );

  let handles: Vec<_> = (0..NUM_THREADS)
    .map(|t| {
      let cache = cache.clone();
      thread::spawn(move || {
        for i in 0..OPS_PER_THREAD {
          let key = i % 16;
          match i % 4 {
            0 => cache.set(key, t),
            1 => {
              cache.get_and_renew(&key);
            }
            2 => {
              cache.restart(&key);
            }
            _ => {
              cache.delete(&key);
            }
          }
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }

  // However the operations interleaved, entries and timers stay paired.
  assert_eq!(cache.len(), cache.timer_count());
  assert_eq!(cache.len(), cache.iter().count());
}

#[test]
fn test_every_entry_is_removed_exactly_once() {
  let removed = Arc::new(AtomicUsize::new(0));
  let cache = Arc::new(TimedCache::<usize, usize>::new(Duration::from_millis(50)));

  let counter = removed.clone();
  cache.on_delete(move |_, _, _| {
    counter.fetch_add(1, Ordering::SeqCst);
  });

  let per_thread = 200;
  let handles: Vec<_> = (0..NUM_THREADS)
    .map(|t| {
      let cache = cache.clone();
      thread::spawn(move || {
        for i in 0..per_thread {
          let key = t * per_thread + i;
          cache.set(key, i);
          if i % 2 == 0 {
            cache.delete(&key);
          }
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }

  thread::sleep(Duration::from_millis(400));

  assert_eq!(removed.load(Ordering::SeqCst), NUM_THREADS * per_thread);
  assert!(cache.is_empty());
  assert_eq!(cache.timer_count(), 0);

  let metrics = cache.metrics();
  assert_eq!(metrics.removals as usize, NUM_THREADS * per_thread / 2);
  assert_eq!(metrics.evicted_by_ttl as usize, NUM_THREADS * per_thread / 2);
}
