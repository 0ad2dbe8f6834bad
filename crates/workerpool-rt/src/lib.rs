//! # workerpool-rt
//!
//! The OS-specific half of the worker pool: raw pthread synchronization
//! primitives, the self-pipe monitor fd, the ring-buffer queue, worker
//! thread spawn/lifecycle, the process-wide pool registry, and the
//! `pthread_atfork` fork-safety handler. `workerpool-core` owns everything
//! that doesn't need a syscall; this crate owns everything that does.
//!
//! Consumers should reach for the `workerpool` facade crate rather than
//! this one directly; `PoolInner` is public only so the facade can build
//! `ThreadPool` around an `Arc<PoolInner>` without a second indirection
//! layer.

mod config;
mod cwd;
mod fork;
mod pipe;
mod pool;
mod queue;
mod registry;
mod sync;
mod worker;

pub use config::PoolConfig;
pub use pool::PoolInner;
