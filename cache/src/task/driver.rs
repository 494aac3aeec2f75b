use crate::shared::CacheShared;

use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

/// The background task that advances the timer wheels and evicts expired
/// entries.
///
/// It only holds a `Weak` reference to the cache, so it never keeps the cache
/// alive, and it parks without a timeout while the cache is empty.
pub(crate) struct Driver {
  handle: JoinHandle<()>, // Detached when the driver is dropped.
  stop_flag: Arc<AtomicBool>,
}

impl Driver {
  /// Spawns a new driver thread.
  pub(crate) fn spawn<K, V, H>(shared: Weak<CacheShared<K, V, H>>, tick_interval: Duration) -> Self
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_clone = stop_flag.clone();

    let handle = thread::spawn(move || {
      debug!(?tick_interval, "expiration driver started");
      let tick_nanos = tick_interval.as_nanos().max(1);
      let mut last_tick = Instant::now();

      while !stop_clone.load(Ordering::Acquire) {
        let Some(core) = shared.upgrade() else {
          break;
        };

        if core.is_empty() {
          // Nothing is armed. `set` unparks us when the first entry arrives.
          drop(core);
          thread::park();
          last_tick = Instant::now();
          continue;
        }

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(last_tick).as_nanos();
        let ticks = u64::try_from(elapsed / tick_nanos).unwrap_or(u64::MAX);
        if ticks > 0 {
          core.expire(ticks, now);
          let ticks = u32::try_from(ticks).unwrap_or(u32::MAX);
          last_tick += tick_interval.saturating_mul(ticks);
        }
        // Release the cache before sleeping so dropping it is never delayed.
        drop(core);

        let next_tick = last_tick + tick_interval;
        thread::park_timeout(next_tick.saturating_duration_since(Instant::now()));
      }

      debug!("expiration driver stopped");
    });

    Self { handle, stop_flag }
  }

  /// Wakes the driver if it is parked waiting for work.
  #[inline]
  pub(crate) fn wake(&self) {
    self.handle.thread().unpark();
  }

  /// Signals the driver thread to stop.
  pub(crate) fn stop(self) {
    self.stop_flag.store(true, Ordering::Release);
    self.handle.thread().unpark();
  }
}
