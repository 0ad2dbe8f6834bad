//! Tunable defaults for the pool.

use std::time::Duration;

/// Minimum ring-buffer queue capacity, and the capacity a freshly
/// constructed pool starts with.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// A worker that stays idle this long self-terminates.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1);
