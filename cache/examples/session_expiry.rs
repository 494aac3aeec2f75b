use fibre_ttl::{EvictionReason, TimedCache};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
  // Every entry lives for 3 seconds unless it is read with renewal.
  let cache = TimedCache::<String, String>::new(Duration::from_secs(3));

  cache.on_delete(|key: &String, value: &Arc<String>, reason: EvictionReason| {
    println!("delete {key} {value} ({reason})");
  });

  println!("Setting A.");
  cache.set("A".to_string(), "foo".to_string());
  thread::sleep(Duration::from_secs(1));

  println!("Setting B.");
  cache.set("B".to_string(), "goo".to_string());

  // A is removed about 2 seconds from now and B about 3 seconds from now.
  thread::sleep(Duration::from_secs(5));

  println!("\nCache metrics: {:#?}", cache.metrics());
}
