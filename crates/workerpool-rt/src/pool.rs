//! Pool state and the operations defined over it.
//!
//! Every field behind [`PoolState`] is guarded by `mutex`; accessing it
//! without holding that lock is a bug, not merely bad style, since the
//! fork handler and worker threads both reach in via raw pointers rather
//! than a borrow-checked guard (see `sync.rs` for why).

use std::io;
use std::os::raw::c_void;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use workerpool_core::error::{PoolError, PoolResult};
use workerpool_core::job::{Job, JobFn, JobId, SignalFn};

use crate::config::PoolConfig;
use crate::pipe::SelfPipe;
use crate::queue::JobQueue;
use crate::registry;
use crate::sync::{RawCondvar, RawMutex};
use crate::worker;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

fn next_pool_id() -> u64 {
    NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Everything the pool mutex protects.
pub(crate) struct PoolState {
    pub(crate) queue: JobQueue,
    pub(crate) current_threads: u32,
    pub(crate) idle_threads: u32,
    pub(crate) stopped: bool,
    pub(crate) destroyed: bool,
    pub(crate) pipe: SelfPipe,
    /// Set by the fork handler's prepare phase while it is rendezvousing
    /// with idle workers; `None` the rest of the time. The pointee lives on
    /// the forking thread's stack for the duration of the fork, which is
    /// why only worker threads still parked in the prepare window may
    /// dereference it.
    pub(crate) prefork_cond: Option<*const RawCondvar>,
}

pub struct PoolInner {
    pub(crate) id: u64,
    pub(crate) mutex: RawMutex,
    pub(crate) work_available: RawCondvar,
    pub(crate) fork_mutex: RawMutex,
    state: std::cell::UnsafeCell<PoolState>,
    max_threads: u32,
    idle_timeout: Duration,
    per_thread_cwd: bool,
    pub(crate) signal_fn: SignalFn,
    pub(crate) signal_arg: *mut c_void,
    self_weak: Weak<PoolInner>,
}

// SAFETY: `state` and `signal_arg` are only touched while `mutex` is held
// (the fork handler and worker loop uphold this by construction); the
// pointer inside `signal_arg` is caller-owned and handed back unchanged.
unsafe impl Send for PoolInner {}
unsafe impl Sync for PoolInner {}

impl PoolInner {
    pub fn new(config: PoolConfig, signal_fn: SignalFn, signal_arg: *mut c_void) -> PoolResult<Arc<Self>> {
        let pipe = SelfPipe::new()?;
        let queue = JobQueue::with_capacity(config.initial_queue_capacity);
        let mutex = RawMutex::new()?;
        let work_available = RawCondvar::new()?;
        let fork_mutex = RawMutex::new()?;
        let per_thread_cwd = crate::cwd::probe_once();
        let id = next_pool_id();
        let max_threads = config.max_threads;
        let idle_timeout = config.idle_timeout;

        let inner = Arc::new_cyclic(|weak| PoolInner {
            id,
            mutex,
            work_available,
            fork_mutex,
            state: std::cell::UnsafeCell::new(PoolState {
                queue,
                current_threads: 0,
                idle_threads: 0,
                stopped: false,
                destroyed: false,
                pipe,
                prefork_cond: None,
            }),
            max_threads,
            idle_timeout,
            per_thread_cwd,
            signal_fn,
            signal_arg,
            self_weak: weak.clone(),
        });

        registry::registry().register(&inner);
        registry::ensure_atfork_installed();
        debug!(pool_id = id, max_threads, per_thread_cwd, "pool initialized");
        Ok(inner)
    }

    /// Caller must hold `mutex`.
    pub(crate) fn state_mut(&self) -> &mut PoolState {
        unsafe { &mut *self.state.get() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Zero once the pool is stopped, matching the source's convention that
    /// a stopped pool advertises no remaining parallelism.
    pub fn max_threads(&self) -> u32 {
        let _guard = self.mutex.lock();
        if self.state_mut().stopped {
            0
        } else {
            self.max_threads
        }
    }

    /// A raw pthread mutex cannot poison the way `std::sync::Mutex` can —
    /// there is no unwind hook to mark it. A panic while this lock is held
    /// simply deadlocks every other caller, which is the same "process is
    /// already in trouble" outcome a poisoned `std::sync::Mutex` signals, so
    /// there is nothing extra to report here.
    pub fn queued_jobs(&self) -> usize {
        let _guard = self.mutex.lock();
        self.state_mut().queue.len()
    }

    pub fn per_thread_cwd(&self) -> bool {
        self.per_thread_cwd
    }

    pub fn add_job(&self, id: JobId, func: JobFn, payload: *mut c_void) -> PoolResult<i32> {
        let guard = self.mutex.lock();
        let state = self.state_mut();
        if state.stopped {
            return Err(PoolError::InvalidState);
        }

        if self.max_threads == 0 {
            drop(guard);
            let rc = unsafe {
                func(payload);
                (self.signal_fn)(id, func, payload, self.signal_arg)
            };
            return Ok(rc);
        }

        if !state.queue.push(Job::new(id, func, payload)) {
            return Err(PoolError::OutOfMemory);
        }

        if state.idle_threads > 0 {
            self.work_available.signal();
            return Ok(0);
        }

        if state.current_threads < self.max_threads {
            match self.spawn_worker() {
                Ok(()) => {
                    state.current_threads += 1;
                    return Ok(0);
                }
                Err(e) => {
                    if state.current_threads > 0 {
                        // Forward progress is still possible; an existing
                        // worker will pick this job up eventually.
                        return Ok(0);
                    }
                    state.queue.undo_push();
                    warn!(pool_id = self.id, error = %e, "worker spawn failed with no worker left to drain the queue");
                    return Err(PoolError::SpawnFailed(e));
                }
            }
        }

        Ok(0)
    }

    pub fn cancel_job(&self, id: JobId, func: JobFn, payload: *mut c_void) -> usize {
        let _guard = self.mutex.lock();
        self.state_mut().queue.cancel(id, func, payload)
    }

    pub fn stop(&self) {
        let _guard = self.mutex.lock();
        self.stop_locked();
    }

    /// Caller must hold `mutex`.
    pub(crate) fn stop_locked(&self) {
        let state = self.state_mut();
        if state.stopped {
            return;
        }
        state.stopped = true;
        state.pipe.close();
        self.work_available.broadcast();
        debug!(pool_id = self.id, "pool stopped");
    }

    /// Marks the pool destroyed and stops it if it wasn't already. Freeing
    /// actually happens via ordinary `Arc` refcounting: the facade's
    /// `ThreadPool` drops its handle right after calling this, and each
    /// worker holds its own clone until the moment it exits, so the pool is
    /// deallocated by whichever of those is last — no manual bookkeeping
    /// required.
    pub fn mark_destroyed(&self) {
        let _guard = self.mutex.lock();
        assert!(!self.state_mut().destroyed, "pool destroyed twice");
        self.state_mut().destroyed = true;
        if !self.state_mut().stopped {
            self.stop_locked();
        }
        debug!(
            pool_id = self.id,
            current_threads = self.state_mut().current_threads,
            "pool marked for destruction"
        );
    }

    pub fn restart_check(&self) -> PoolResult<()> {
        let _guard = self.mutex.lock();
        let state = self.state_mut();
        if state.stopped {
            return Err(PoolError::InvalidState);
        }
        let queued = state.queue.len();
        if queued == 0 {
            return Ok(());
        }
        if state.idle_threads > 0 {
            self.work_available.broadcast();
        }

        let possible = self.max_threads.saturating_sub(state.current_threads);
        let missing = queued.saturating_sub(state.idle_threads as usize) as u32;
        let to_spawn = missing.min(possible);

        let mut spawned = 0u32;
        let mut last_err = None;
        for _ in 0..to_spawn {
            match self.spawn_worker() {
                Ok(()) => {
                    state.current_threads += 1;
                    spawned += 1;
                }
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }

        if spawned == to_spawn || state.current_threads > 0 {
            Ok(())
        } else {
            Err(PoolError::SpawnFailed(
                last_err.expect("to_spawn > 0 with no successes implies a recorded error"),
            ))
        }
    }

    pub fn monitor_fd(&self) -> PoolResult<OwnedFd> {
        let _guard = self.mutex.lock();
        let state = self.state_mut();
        if state.stopped {
            return Err(PoolError::InvalidState);
        }
        match state.pipe.dup_monitor_fd() {
            Some(Ok(fd)) => Ok(fd),
            Some(Err(e)) => Err(PoolError::Io(e)),
            None => Err(PoolError::Unsupported),
        }
    }

    pub fn monitor_drain(&self) -> PoolResult<()> {
        let _guard = self.mutex.lock();
        self.state_mut().pipe.drain().map_err(PoolError::Io)
    }

    /// Caller must hold `mutex`; decrements the live-worker count and, if
    /// the self-pipe is still open, wakes anyone watching the monitor fd so
    /// they know to call `restart_check`.
    pub(crate) fn worker_exiting(&self) {
        let state = self.state_mut();
        state.current_threads -= 1;
        if state.pipe.is_open() {
            state.pipe.notify();
        }
    }

    /// Caller must hold `mutex`; spawning itself does not touch
    /// `current_threads`, the caller increments it once this returns `Ok`.
    pub(crate) fn spawn_worker(&self) -> io::Result<()> {
        let pool = self
            .self_weak
            .upgrade()
            .expect("pool alive while one of its own operations is spawning a worker");
        let name = format!("workerpool-{}", self.id);
        worker::spawn_blocked(name, move || worker::worker_loop(pool))
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        registry::registry().unregister(self);
        debug!(pool_id = self.id, "pool freed");
    }
}
