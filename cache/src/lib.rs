//! A concurrent, in-memory key-value store where every entry expires.
//!
//! Each entry carries its own armed timer. Once the time-to-live elapses
//! without renewal the entry is evicted and an eviction notification is
//! delivered to every registered listener.
//!
//! # Features
//! - **Per-entry TTL**: a default time-to-live fixed at construction, with
//!   per-call overrides on `set`, `get_and_renew_with` and `restart_with`.
//! - **Renew on read**: `get_and_renew` restarts the countdown; `get` and
//!   `has` never do.
//! - **Exactly-once notifications**: explicit `delete` and TTL expiry share
//!   one removal path, so each removed entry is reported once. `clear` is
//!   silent.
//! - **High Concurrency**: a sharded store where each shard owns its entries
//!   and the timer wheel that expires them, under a single lock.
//! - **No stray background work**: the expiration thread parks while the
//!   cache is empty and stops when the cache is dropped.
//!
//! ```no_run
//! use fibre_ttl::{EvictionReason, TimedCache};
//! use std::time::Duration;
//!
//! let cache = TimedCache::<String, u32>::new(Duration::from_secs(3));
//! cache.on_delete(|key: &String, value: &std::sync::Arc<u32>, reason: EvictionReason| {
//!   println!("{key} -> {value} removed: {reason}");
//! });
//!
//! cache.set("session".to_string(), 7);
//! assert_eq!(cache.get_and_renew("session").as_deref(), Some(&7));
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod iter;
pub mod listener;
pub mod metrics;

// Internal, crate-only modules
mod entry;
mod shared;
mod store;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::{CacheBuilder, TimerWheelMode};
pub use error::BuildError;
pub use handles::{Renewal, TimedCache};
pub use iter::Iter;
pub use listener::{EvictionListener, EvictionReason, SubscriptionId};
pub use metrics::MetricsSnapshot;
