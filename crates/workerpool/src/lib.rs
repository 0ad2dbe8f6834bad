//! # workerpool
//!
//! A bounded-parallelism worker pool for offloading short, independent jobs
//! off a caller's own thread, built for single-threaded event-driven
//! programs (the kind that poll one `epoll`/`kqueue` loop and can't afford
//! to block it on a blocking syscall).
//!
//! ```text
//!        submit(id, fn, payload)
//!              |
//!              v
//!      +----------------+      work_available       +--------+
//!      |  ring-buffer    | -------------------------> | worker | -> fn(payload)
//!      |  job queue      | <- idle/current/max counts |  loop  | -> signal_fn(..)
//!      +----------------+                             +--------+
//!              |                                           |
//!              | stopped/destroyed                         | self-pipe byte
//!              v                                           v
//!         cooperative shutdown                     external event loop
//!                                                   (via monitor fd)
//! ```
//!
//! Construction, destruction, worker spawn/exit and every `stopped`
//! transition log at `debug` through `tracing`; a worker retiring itself
//! because `signal_fn` returned non-zero logs at `warn`. See
//! [`ThreadPool::new`] for the one subtlety in the completion contract.
//!
//! The pool also survives `fork()`: every live pool quiesces its idle
//! workers before the fork and the child is born stopped, with an empty
//! queue, rather than inheriting half-woken threads that no longer exist.
//! See `workerpool-rt`'s internals for the mechanism; nothing about it is
//! visible from this crate's API.

use std::os::fd::OwnedFd;
use std::os::raw::c_void;

pub use workerpool_core::error::{PoolError, PoolResult};
pub use workerpool_core::job::{JobFn, JobId, SignalFn};
pub use workerpool_rt::PoolConfig;

use workerpool_rt::PoolInner;
use std::sync::Arc;

/// A handle to a running (or stopped) worker pool.
///
/// Cloning is not supported — a pool has exactly one owner, with a single
/// `init`/`destroy` pairing. Workers hold their own internal reference and
/// keep the pool alive until they've each exited, even after the owner
/// drops this handle.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
}

impl ThreadPool {
    /// Create a pool. `max_threads == 0` puts it in synchronous mode: every
    /// `add_job` call runs the job and `signal_fn` inline on the caller's
    /// thread, and no OS thread is ever spawned.
    ///
    /// `signal_fn` is called after every job finishes, including jobs run
    /// inline in synchronous mode. Returning non-zero from it ends the
    /// worker that ran the job (or, for an async pool, simply retires that
    /// worker thread) — but the job itself already ran and its side effects
    /// already happened. A non-zero return only means the *notification*
    /// path was judged unreliable by the caller; it does not undo the job.
    /// Callers that need completion visibility despite a worker exiting
    /// should watch [`ThreadPool::monitor_fd`] rather than assume a
    /// non-zero `signal_fn` return implies the job didn't run.
    pub fn new(config: PoolConfig, signal_fn: SignalFn, signal_arg: *mut c_void) -> PoolResult<Self> {
        Ok(Self {
            inner: PoolInner::new(config, signal_fn, signal_arg)?,
        })
    }

    /// Configured parallelism, or 0 once the pool is stopped.
    pub fn max_threads(&self) -> u32 {
        self.inner.max_threads()
    }

    /// Number of jobs currently queued (not yet picked up by a worker).
    pub fn queued_jobs(&self) -> usize {
        self.inner.queued_jobs()
    }

    /// Whether workers on this pool each have their own filesystem view
    /// (working directory, root, umask), making `chdir`-family syscalls
    /// safe to issue from job functions without racing siblings.
    pub fn per_thread_cwd(&self) -> bool {
        self.inner.per_thread_cwd()
    }

    /// Enqueue a job. In synchronous pools (`max_threads == 0`) this runs
    /// the job and `signal_fn` inline and returns `signal_fn`'s result;
    /// otherwise it returns `Ok(0)` once the job is queued or dispatched.
    ///
    /// # Safety
    /// `func` is invoked later as `func(payload)` on a worker thread (or
    /// inline, for synchronous pools); the caller must ensure `payload`
    /// stays valid and usable from another thread until then.
    pub unsafe fn add_job(&self, id: JobId, func: JobFn, payload: *mut c_void) -> PoolResult<i32> {
        self.inner.add_job(id, func, payload)
    }

    /// Remove every not-yet-dispatched job matching `(id, func, payload)`
    /// from the queue. Returns how many were removed. A job already running
    /// cannot be cancelled.
    pub fn cancel_job(&self, id: JobId, func: JobFn, payload: *mut c_void) -> usize {
        self.inner.cancel_job(id, func, payload)
    }

    /// Stop accepting new dispatch: queued jobs already in flight still run
    /// to completion, but no more are dequeued and no new worker is
    /// spawned. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Explicit early release, equivalent to dropping this handle now
    /// rather than at scope exit. Provided because "destroy this pool" is
    /// often a meaningful step in a caller's own state machine, not just
    /// incidental cleanup.
    pub fn destroy(self) {
        // Dropping `self` here runs the same logic as an implicit drop.
    }

    /// Re-evaluate whether enough workers exist to drain the queue,
    /// spawning more up to `max_threads` if not. Meant to be called after
    /// the monitor fd wakes an event loop, in case `signal_fn` killed a
    /// worker mid-queue.
    pub fn restart_check(&self) -> PoolResult<()> {
        self.inner.restart_check()
    }

    /// A fresh, close-on-exec, non-blocking duplicate of the pool's monitor
    /// read fd. Becomes readable whenever a worker exits unexpectedly.
    pub fn restart_check_monitor_fd(&self) -> PoolResult<OwnedFd> {
        self.inner.monitor_fd()
    }

    /// Drain the monitor fd after observing it readable.
    pub fn restart_check_monitor_drain(&self) -> PoolResult<()> {
        self.inner.monitor_drain()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.inner.mark_destroyed();
    }
}
