use crate::error::BuildError;
use crate::handles::TimedCache;
use crate::listener::{EvictionListener, Listeners};
use crate::metrics::Metrics;
use crate::shared::CacheShared;
use crate::store::ShardedStore;
use crate::task::driver::Driver;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;

/// Defines preset configurations for the cache's internal timer wheel.
///
/// The tick duration is the expiration granularity: an entry is evicted no
/// earlier than its deadline and typically within one tick after it. The
/// driver thread wakes once per tick while the cache is non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerWheelMode {
  /// A general-purpose configuration suitable for TTLs from tens of
  /// milliseconds to hours.
  ///
  /// - Granularity: 10 milliseconds
  /// - Wheel Size: 512 slots (~5 second cycle)
  #[default]
  Default,

  /// Optimized for entries with very short lifetimes (a few milliseconds).
  ///
  /// - Granularity: 1 millisecond
  /// - Wheel Size: 1024 slots (~1 second cycle)
  HighPrecisionShortLived,

  /// Optimized for entries living many minutes or hours.
  /// Reduces periodic work by using a coarse granularity.
  ///
  /// - Granularity: 1 second
  /// - Wheel Size: 3600 slots (1-hour cycle)
  LowPrecisionLongLived,
}

impl TimerWheelMode {
  fn parameters(self) -> (usize, Duration) {
    match self {
      TimerWheelMode::Default => (512, Duration::from_millis(10)),
      TimerWheelMode::HighPrecisionShortLived => (1024, Duration::from_millis(1)),
      TimerWheelMode::LowPrecisionLongLived => (3600, Duration::from_secs(1)),
    }
  }
}

/// A builder for creating `TimedCache` instances.
pub struct CacheBuilder<K, V, H = ahash::RandomState> {
  time_to_live: Duration,
  shards: usize,
  hasher: H,
  timer_wheel_tick_duration: Duration,
  timer_wheel_size: usize,
  listeners: Vec<Arc<dyn EvictionListener<K, V>>>,
  _marker: PhantomData<fn(K, V)>,
}

// Manual Debug implementation for CacheBuilder.
impl<K, V, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("time_to_live", &self.time_to_live)
      .field("shards", &self.shards)
      .field("timer_wheel_tick_duration", &self.timer_wheel_tick_duration)
      .field("timer_wheel_size", &self.timer_wheel_size)
      .field("listeners", &self.listeners.len())
      .finish_non_exhaustive()
  }
}

impl<K, V> CacheBuilder<K, V, ahash::RandomState> {
  /// Creates a new `CacheBuilder` whose entries live for `time_to_live`
  /// unless an operation supplies its own duration.
  ///
  /// A zero duration is accepted and means "expire on the next tick".
  pub fn new(time_to_live: Duration) -> Self {
    let (wheel_size, tick) = TimerWheelMode::Default.parameters();
    Self {
      time_to_live,
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      hasher: ahash::RandomState::new(),
      timer_wheel_tick_duration: tick,
      timer_wheel_size: wheel_size,
      listeners: Vec::new(),
      _marker: PhantomData,
    }
  }
}

// --- General Configuration Methods ---
impl<K, V, H> CacheBuilder<K, V, H> {
  /// Sets the default time-to-live used by `set`, `get_and_renew` and
  /// `restart` when no explicit duration is given.
  pub fn time_to_live(mut self, duration: Duration) -> Self {
    self.time_to_live = duration;
    self
  }

  /// Sets the number of concurrent shards to use.
  ///
  /// Rounded up to the next power of two when the cache is built.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards;
    self
  }

  /// Sets the hasher for the cache.
  pub fn hasher<S>(self, hasher: S) -> CacheBuilder<K, V, S> {
    CacheBuilder {
      time_to_live: self.time_to_live,
      shards: self.shards,
      hasher,
      timer_wheel_tick_duration: self.timer_wheel_tick_duration,
      timer_wheel_size: self.timer_wheel_size,
      listeners: self.listeners,
      _marker: PhantomData,
    }
  }

  /// Registers an eviction listener that is in place before the first entry
  /// is stored. More can be added later with `TimedCache::on_delete`.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener<K, V> + 'static,
  {
    self.listeners.push(Arc::new(listener));
    self
  }

  /// Sets the timer wheel configuration using a convenient preset.
  ///
  /// This will set both the `tick_duration` and `wheel_size` internally.
  /// Any subsequent calls to `.timer_tick_duration()` or `.timer_wheel_size()`
  /// will override the values set by this preset.
  pub fn timer_mode(mut self, mode: TimerWheelMode) -> Self {
    let (size, duration) = mode.parameters();
    self.timer_wheel_size = size;
    self.timer_wheel_tick_duration = duration;
    self
  }

  /// Sets the granularity of the timer wheel.
  ///
  /// This is the duration that each "tick" of the wheel represents. A smaller
  /// duration provides more precise expiration at the cost of more frequent
  /// wakeups of the driver thread.
  ///
  /// Defaults to `10 milliseconds`.
  pub fn timer_tick_duration(mut self, duration: Duration) -> Self {
    self.timer_wheel_tick_duration = duration;
    self
  }

  /// Sets the number of slots in the timer wheel.
  ///
  /// The total cycle time of the wheel is `tick_duration * wheel_size`.
  /// Timers further out than one cycle are revisited once per cycle.
  ///
  /// Defaults to `512` slots.
  pub fn timer_wheel_size(mut self, size: usize) -> Self {
    self.timer_wheel_size = size;
    self
  }
}

// --- Build Methods ---
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds a `TimedCache`.
  pub fn build(self) -> Result<TimedCache<K, V, H>, BuildError> {
    self.validate()?;
    Ok(self.assemble())
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.shards == 0 {
      return Err(BuildError::ZeroShards);
    }
    if self.timer_wheel_tick_duration.is_zero() {
      return Err(BuildError::ZeroTickDuration);
    }
    if self.timer_wheel_size == 0 {
      return Err(BuildError::ZeroWheelSize);
    }
    Ok(())
  }

  /// Constructs the shared core and starts its driver. Expects a validated
  /// configuration.
  pub(crate) fn assemble(self) -> TimedCache<K, V, H> {
    let shards = self.shards.max(1).next_power_of_two();
    let store = ShardedStore::new(
      shards,
      self.hasher,
      self.timer_wheel_size,
      self.timer_wheel_tick_duration,
    );

    let listeners = Listeners::new();
    for listener in self.listeners {
      listeners.subscribe(listener);
    }

    let shared = Arc::new(CacheShared {
      store,
      metrics: Metrics::new(),
      listeners,
      time_to_live: self.time_to_live,
      driver: OnceCell::new(),
    });

    let driver = Driver::spawn(Arc::downgrade(&shared), self.timer_wheel_tick_duration);
    if let Err(driver) = shared.driver.set(driver) {
      // Only reachable if the cell was filled elsewhere; never leave a
      // second thread running.
      driver.stop();
    }

    TimedCache { shared }
  }
}
