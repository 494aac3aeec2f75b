use fibre_ttl::{Renewal, TimedCache};
use std::time::Duration;

const LONG_TTL: Duration = Duration::from_secs(60);

#[test]
fn test_set_and_get() {
  let cache = TimedCache::<String, String>::new(LONG_TTL);
  assert!(cache.is_empty());

  cache.set("a".to_string(), "alpha".to_string());
  cache.set("b".to_string(), "beta".to_string());

  assert_eq!(cache.len(), 2);
  assert_eq!(cache.get("a").as_deref().map(String::as_str), Some("alpha"));
  assert_eq!(cache.get("b").as_deref().map(String::as_str), Some("beta"));
  assert!(cache.get("c").is_none());
  assert_eq!(cache.default_ttl(), LONG_TTL);
}

#[test]
fn test_set_replaces_value() {
  let cache = TimedCache::<i32, &str>::new(LONG_TTL);

  cache.set(1, "one");
  cache.set(1, "uno");

  assert_eq!(cache.len(), 1);
  assert_eq!(cache.get(&1).as_deref(), Some(&"uno"));
  assert_eq!(cache.timer_count(), 1, "replacing must not leave a second timer");
}

#[test]
fn test_has_is_a_peek() {
  let cache = TimedCache::<i32, i32>::new(LONG_TTL);
  cache.set(1, 10);

  assert!(cache.has(&1));
  assert!(!cache.has(&2));

  let metrics = cache.metrics();
  assert_eq!(metrics.hits, 0);
  assert_eq!(metrics.misses, 0);
  assert_eq!(metrics.renewals, 0);
}

#[test]
fn test_delete() {
  let cache = TimedCache::<i32, i32>::new(LONG_TTL);
  cache.set(1, 10);

  assert!(cache.delete(&1));
  assert!(!cache.has(&1));
  assert!(!cache.delete(&1), "second delete removes nothing");
  assert!(!cache.delete(&42));
  assert_eq!(cache.len(), 0);
  assert_eq!(cache.timer_count(), 0);
}

#[test]
fn test_clear_releases_every_timer() {
  let cache = TimedCache::<i32, i32>::new(LONG_TTL);
  for i in 0..100 {
    cache.set(i, i);
  }
  assert_eq!(cache.timer_count(), 100);

  cache.clear();
  assert_eq!(cache.len(), 0);
  assert!(cache.is_empty());
  assert_eq!(cache.timer_count(), 0);
  assert!(cache.get(&1).is_none());

  // The cache is fully usable after a clear.
  cache.set(1, 1);
  assert_eq!(cache.len(), 1);
  assert_eq!(cache.timer_count(), 1);
}

#[test]
fn test_restart_reports_presence() {
  let cache = TimedCache::<&str, i32>::new(LONG_TTL);
  cache.set("a", 1);

  assert!(cache.restart(&"a"));
  assert!(cache.restart_with(&"a", Duration::from_secs(5)));
  assert!(!cache.restart(&"missing"));
  assert!(!cache.restart_with(&"missing", Duration::from_secs(5)));
  assert_eq!(cache.timer_count(), 1);
}

#[test]
fn test_get_with_each_renewal_mode() {
  let cache = TimedCache::<&str, i32>::new(LONG_TTL);
  cache.set("a", 1);

  assert_eq!(cache.get_with(&"a", Renewal::None).as_deref(), Some(&1));
  assert_eq!(cache.get_with(&"a", Renewal::Default).as_deref(), Some(&1));
  assert_eq!(
    cache
      .get_with(&"a", Renewal::With(Duration::from_secs(1)))
      .as_deref(),
    Some(&1)
  );
  assert!(cache.get_with(&"missing", Renewal::Default).is_none());

  let metrics = cache.metrics();
  assert_eq!(metrics.renewals, 2);
  assert_eq!(metrics.hits, 3);
  assert_eq!(metrics.misses, 1);
}

#[test]
fn test_missing_key_renewal_has_no_side_effects() {
  let cache = TimedCache::<&str, i32>::new(LONG_TTL);

  assert!(cache.get_and_renew(&"ghost").is_none());
  assert!(cache.get_and_renew_with(&"ghost", Duration::ZERO).is_none());
  assert_eq!(cache.len(), 0);
  assert_eq!(cache.timer_count(), 0);
}

#[test]
fn test_metrics_track_operations() {
  let cache = TimedCache::<i32, i32>::new(LONG_TTL);

  cache.set(1, 1);
  cache.set(2, 2);
  cache.set(1, 11);
  cache.get(&1);
  cache.get(&3);
  cache.get_and_renew(&2);
  cache.delete(&2);
  cache.clear();

  let metrics = cache.metrics();
  assert_eq!(metrics.inserts, 2);
  assert_eq!(metrics.updates, 1);
  assert_eq!(metrics.hits, 2);
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.renewals, 1);
  assert_eq!(metrics.removals, 1);
  assert_eq!(metrics.clears, 1);
  assert_eq!(metrics.evicted_by_ttl, 0);
  assert_eq!(metrics.current_size, 0);
}
