//! Error types for the worker pool.

use std::fmt;
use std::io;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors a caller can observe from the pool's public surface.
///
/// Internal invariant violations (a poisoned mutex during destroy, a
/// double-free) are not represented here: they panic, because by the time
/// they'd occur the pool's bookkeeping is already inconsistent.
#[derive(Debug)]
pub enum PoolError {
    /// Allocation or queue growth failed.
    OutOfMemory,
    /// The operation is invalid against a stopped pool.
    InvalidState,
    /// The pool has no monitor pipe (synchronous pool, `max_threads == 0`).
    Unsupported,
    /// Worker thread creation failed.
    SpawnFailed(io::Error),
    /// A pipe read/write surfaced an OS error unchanged.
    Io(io::Error),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::OutOfMemory => write!(f, "out of memory"),
            PoolError::InvalidState => write!(f, "pool is stopped"),
            PoolError::Unsupported => write!(f, "pool has no monitor pipe"),
            PoolError::SpawnFailed(e) => write!(f, "failed to spawn worker thread: {e}"),
            PoolError::Io(e) => write!(f, "pool i/o error: {e}"),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::SpawnFailed(e) | PoolError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PoolError {
    fn from(e: io::Error) -> Self {
        PoolError::Io(e)
    }
}
