//! Worker thread spawn and the loop each worker runs until it retires.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::pool::PoolInner;
use crate::sync::WaitResult;

/// Spawn `body` as a detached thread with every signal blocked, so
/// asynchronously-delivered signals keep landing on the thread that owns
/// the pool rather than a worker. The calling thread's original mask is
/// restored once the spawn syscall returns, win or lose. The returned
/// `JoinHandle` is dropped rather than joined — the Rust equivalent of the
/// C library's `PTHREAD_CREATE_DETACHED` attribute.
pub(crate) fn spawn_blocked<F>(name: String, body: F) -> io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    #[cfg(unix)]
    {
        let mut full: libc::sigset_t = unsafe { std::mem::zeroed() };
        let mut old: libc::sigset_t = unsafe { std::mem::zeroed() };
        unsafe {
            libc::sigfillset(&mut full);
            libc::pthread_sigmask(libc::SIG_SETMASK, &full, &mut old);
        }
        let result = std::thread::Builder::new().name(name).spawn(body);
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &old, std::ptr::null_mut());
        }
        result.map(drop)
    }
    #[cfg(not(unix))]
    {
        std::thread::Builder::new().name(name).spawn(body).map(drop)
    }
}

/// The loop a worker thread runs from spawn to retirement: wait for work or
/// an idle timeout, run the job off-lock, report it, repeat.
pub(crate) fn worker_loop(pool: Arc<PoolInner>) {
    if pool.per_thread_cwd() {
        crate::cwd::detach_fs();
    }

    let mut guard = pool.mutex.lock();
    'outer: loop {
        let deadline = Instant::now() + pool.idle_timeout();

        loop {
            let state = pool.state_mut();
            if state.stopped || state.queue.len() > 0 {
                break;
            }

            state.idle_threads += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait_result = pool.work_available.wait_timeout(guard.mutex(), remaining);
            pool.state_mut().idle_threads -= 1;

            if let Some(prefork_cond) = pool.state_mut().prefork_cond.take() {
                // Rendezvous with the fork handler: tell it we've parked,
                // then block on the fork-mutex (which it holds for the
                // duration of the fork) before resuming normal service.
                unsafe { (*prefork_cond).signal() };
                drop(guard);
                {
                    let _fork_guard = pool.fork_mutex.lock();
                }
                guard = pool.mutex.lock();
                continue;
            }

            if wait_result == WaitResult::TimedOut && pool.state_mut().queue.len() == 0 {
                pool.worker_exiting();
                break 'outer;
            }
        }

        let state = pool.state_mut();
        if state.stopped {
            pool.worker_exiting();
            break 'outer;
        }

        let job = state.queue.pop().expect("queue non-empty, just checked above");
        drop(guard);

        unsafe { (job.func)(job.payload) };
        let signal_rc = unsafe { (pool.signal_fn)(job.id, job.func, job.payload, pool.signal_arg) };

        guard = pool.mutex.lock();
        if signal_rc != 0 {
            warn!(pool_id = pool.id(), job_id = job.id, "signal_fn failed, retiring worker");
            pool.worker_exiting();
            break 'outer;
        }
        if pool.state_mut().stopped {
            pool.worker_exiting();
            break 'outer;
        }
    }
}
