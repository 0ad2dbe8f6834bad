//! Pool configuration.

use std::time::Duration;

use workerpool_core::constants::{DEFAULT_IDLE_TIMEOUT, DEFAULT_QUEUE_CAPACITY};

/// Tunables for a [`crate::pool::Pool`].
///
/// `max_threads = 0` puts the pool in synchronous mode: `add_job` runs the
/// job inline and no OS thread is ever created.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub(crate) max_threads: u32,
    pub(crate) idle_timeout: Duration,
    pub(crate) initial_queue_capacity: usize,
}

impl PoolConfig {
    pub fn new(max_threads: u32) -> Self {
        Self {
            max_threads,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            initial_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn max_threads(mut self, n: u32) -> Self {
        self.max_threads = n;
        self
    }

    pub fn idle_timeout(mut self, d: Duration) -> Self {
        self.idle_timeout = d;
        self
    }

    /// Must be a power of two >= 4; non-conforming values are rounded up.
    pub fn initial_queue_capacity(mut self, cap: usize) -> Self {
        self.initial_queue_capacity = cap.max(DEFAULT_QUEUE_CAPACITY).next_power_of_two();
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(
            std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(4),
        )
    }
}
