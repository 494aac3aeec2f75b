use thiserror::Error;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The cache was configured with zero shards, which is not allowed.
  #[error("shard count cannot be zero")]
  ZeroShards,
  /// The timer wheel was configured with a zero tick duration.
  #[error("timer tick duration cannot be zero")]
  ZeroTickDuration,
  /// The timer wheel was configured with zero slots.
  #[error("timer wheel size cannot be zero")]
  ZeroWheelSize,
}
