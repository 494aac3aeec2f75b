use generational_arena::{Arena, Index};
use std::time::{Duration, Instant};

// Longer delays are clamped. An `Instant` cannot represent arbitrary
// deadlines, and a century is "never" for any cache.
const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

// A pending one-shot timer. The key is carried so the driver knows which
// entry to remove when it fires.
pub(crate) struct Timer<K> {
  pub(crate) key: K,
  pub(crate) deadline: Instant,
}

/// Opaque handle to an armed timer.
///
/// Handles are generational: once a timer has fired or been cancelled, its
/// handle never resolves again, even if the underlying slot is reused.
pub(crate) type TimerHandle = Index;

/// A hashed timer wheel.
///
/// Each slot holds the handles of timers whose deadline falls on that tick
/// modulo the wheel size. Deadlines further away than one full lap simply get
/// re-bucketed when their slot comes around and they are not yet due, so the
/// wheel never fires a timer before its deadline.
pub(crate) struct TimerWheel<K> {
  timers: Arena<Timer<K>>,
  slots: Box<[Vec<TimerHandle>]>,
  current_tick: u64,
  tick_duration: Duration,
}

impl<K> TimerWheel<K> {
  pub(crate) fn new(wheel_size: usize, tick_duration: Duration) -> Self {
    let mut slots = Vec::with_capacity(wheel_size);
    for _ in 0..wheel_size {
      slots.push(Vec::new());
    }
    Self {
      timers: Arena::new(),
      slots: slots.into_boxed_slice(),
      current_tick: 0,
      tick_duration,
    }
  }

  /// The number of armed timers.
  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.timers.len()
  }

  /// Arms a timer that fires `delay` after `now`.
  pub(crate) fn schedule(&mut self, key: K, delay: Duration, now: Instant) -> TimerHandle {
    let delay = delay.min(MAX_DELAY);
    let deadline = now
      .checked_add(delay)
      .or_else(|| now.checked_add(MAX_DELAY / 1000))
      .unwrap_or(now);
    let handle = self.timers.insert(Timer { key, deadline });
    let slot = self.slot_for(self.ticks_for(delay));
    self.slots[slot].push(handle);
    handle
  }

  /// Cancels `handle` and arms a fresh timer for the same key.
  ///
  /// Returns `None` if the handle no longer refers to an armed timer.
  pub(crate) fn reschedule(
    &mut self,
    handle: TimerHandle,
    delay: Duration,
    now: Instant,
  ) -> Option<TimerHandle> {
    let timer = self.timers.remove(handle)?;
    Some(self.schedule(timer.key, delay, now))
  }

  /// Cancels a timer. Cancelling a timer that already fired or was already
  /// cancelled is a no-op.
  ///
  /// The stale handle stays in its slot until the slot is next visited, where
  /// it is skipped because it no longer resolves.
  #[inline]
  pub(crate) fn cancel(&mut self, handle: TimerHandle) -> bool {
    self.timers.remove(handle).is_some()
  }

  /// Processes up to `ticks` slots and returns the timers that are due at `now`.
  ///
  /// Processing more than one lap in a single call is pointless since every
  /// slot has been visited by then, so `ticks` is clamped to the wheel size.
  pub(crate) fn advance(&mut self, ticks: u64, now: Instant) -> Vec<(TimerHandle, K)> {
    let mut expired = Vec::new();
    let ticks = ticks.min(self.slots.len() as u64);

    for _ in 0..ticks {
      let slot = (self.current_tick % self.slots.len() as u64) as usize;
      self.current_tick += 1;

      let bucket = std::mem::take(&mut self.slots[slot]);
      for handle in bucket {
        let deadline = match self.timers.get(handle) {
          Some(timer) => timer.deadline,
          // Cancelled.
          None => continue,
        };

        if deadline <= now {
          if let Some(timer) = self.timers.remove(handle) {
            expired.push((handle, timer.key));
          }
        } else {
          let remaining = deadline.saturating_duration_since(now);
          let target = self.slot_for(self.ticks_for(remaining));
          self.slots[target].push(handle);
        }
      }
    }

    expired
  }

  /// Drops every armed timer.
  pub(crate) fn clear(&mut self) {
    self.timers.clear();
    for slot in self.slots.iter_mut() {
      slot.clear();
    }
  }

  // Rounds up so a timer is never placed in a slot that comes around before
  // its deadline.
  fn ticks_for(&self, delay: Duration) -> u64 {
    let tick = self.tick_duration.as_nanos().max(1);
    let ticks = (delay.as_nanos() + tick - 1) / tick;
    u64::try_from(ticks).unwrap_or(u64::MAX)
  }

  #[inline]
  fn slot_for(&self, ticks: u64) -> usize {
    (self.current_tick.wrapping_add(ticks) % self.slots.len() as u64) as usize
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TICK: Duration = Duration::from_millis(10);

  #[test]
  fn fires_only_after_deadline() {
    let start = Instant::now();
    let mut wheel = TimerWheel::new(8, TICK);
    wheel.schedule("a", Duration::from_millis(30), start);

    // Slots are visited but the deadline has not passed yet.
    assert!(wheel.advance(3, start + Duration::from_millis(29)).is_empty());
    assert_eq!(wheel.len(), 1);

    let fired = wheel.advance(1, start + Duration::from_millis(40));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].1, "a");
    assert_eq!(wheel.len(), 0);
  }

  #[test]
  fn zero_delay_fires_on_next_tick() {
    let start = Instant::now();
    let mut wheel = TimerWheel::new(8, TICK);
    wheel.schedule(1, Duration::ZERO, start);

    let fired = wheel.advance(1, start);
    assert_eq!(fired.into_iter().map(|(_, k)| k).collect::<Vec<_>>(), vec![1]);
  }

  #[test]
  fn cancelled_timer_never_fires() {
    let start = Instant::now();
    let mut wheel = TimerWheel::new(8, TICK);
    let handle = wheel.schedule("a", TICK, start);

    assert!(wheel.cancel(handle));
    assert!(!wheel.cancel(handle), "second cancel is a no-op");
    assert!(wheel.advance(8, start + TICK * 10).is_empty());
    assert_eq!(wheel.len(), 0);
  }

  #[test]
  fn reschedule_invalidates_the_old_handle() {
    let start = Instant::now();
    let mut wheel = TimerWheel::new(8, TICK);
    let old = wheel.schedule("a", TICK, start);
    let new = wheel
      .reschedule(old, TICK * 5, start)
      .expect("timer should still be armed");

    assert_ne!(old, new);
    assert!(wheel.reschedule(old, TICK, start).is_none());
    assert!(!wheel.cancel(old));
    assert_eq!(wheel.len(), 1);

    assert!(wheel.advance(2, start + TICK * 2).is_empty());
    let fired = wheel.advance(8, start + TICK * 6);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, new);
  }

  #[test]
  fn deadlines_longer_than_a_lap_are_rebucketed() {
    let start = Instant::now();
    let mut wheel = TimerWheel::new(4, TICK);
    // 10 ticks on a 4-slot wheel: the slot comes around twice before it is due.
    wheel.schedule("late", TICK * 10, start);

    let mut now = start;
    for _ in 0..9 {
      now += TICK;
      assert!(wheel.advance(1, now).is_empty());
    }

    let mut fired = Vec::new();
    for _ in 0..4 {
      now += TICK;
      fired.extend(wheel.advance(1, now));
    }
    assert_eq!(fired.len(), 1);
  }

  #[test]
  fn catching_up_fires_everything_due() {
    let start = Instant::now();
    let mut wheel = TimerWheel::new(16, TICK);
    for i in 0..5u32 {
      wheel.schedule(i, TICK * (i + 1), start);
    }

    // The driver fell far behind; one call with a large tick count clears it.
    let fired = wheel.advance(1_000, start + TICK * 100);
    assert_eq!(fired.len(), 5);
    assert_eq!(wheel.len(), 0);
  }

  #[test]
  fn huge_delay_is_clamped_instead_of_overflowing() {
    let start = Instant::now();
    let mut wheel = TimerWheel::new(8, TICK);
    let handle = wheel.schedule("forever", Duration::MAX, start);

    assert_eq!(wheel.len(), 1);
    assert!(wheel.advance(8, start + Duration::from_secs(3600)).is_empty());
    let handle = wheel
      .reschedule(handle, Duration::MAX, start)
      .expect("timer should still be armed");
    assert!(wheel.cancel(handle));
  }

  #[test]
  fn clear_drops_all_timers() {
    let start = Instant::now();
    let mut wheel = TimerWheel::new(8, TICK);
    let handle = wheel.schedule("a", TICK, start);
    wheel.schedule("b", TICK * 2, start);

    wheel.clear();
    assert_eq!(wheel.len(), 0);
    assert!(!wheel.cancel(handle));
    assert!(wheel.advance(8, start + TICK * 10).is_empty());
  }
}
