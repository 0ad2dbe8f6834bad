//! Job record types shared between the queue, the pool and the worker loop.
//!
//! A job is intentionally untyped: a caller-chosen id, a plain function
//! pointer and an opaque payload pointer. This mirrors the boundary the
//! pool actually needs to cross — jobs are submitted from arbitrary caller
//! code and run on a borrowed worker thread, so the pool itself never needs
//! to know what the payload represents. Callers are responsible for the
//! payload's lifetime and for it being safe to touch from the worker thread
//! it ends up running on.

use std::os::raw::c_void;

/// Caller-chosen job identifier. Not required to be unique.
pub type JobId = u64;

/// A job's work function, taking the opaque payload pointer handed to
/// [`JobId`] at submission time.
pub type JobFn = unsafe fn(*mut c_void);

/// Completion callback invoked on the worker thread after a job's function
/// returns.
///
/// Returning `0` keeps the worker alive; any other value ends the worker
/// and wakes the pool's monitor fd. The job already ran and its side
/// effects are already visible by the time this is called — a non-zero
/// return only suppresses further notification, it does not undo the job.
pub type SignalFn =
    unsafe fn(id: JobId, job_fn: JobFn, payload: *mut c_void, signal_arg: *mut c_void) -> i32;

/// A single queued unit of work.
#[derive(Clone, Copy)]
pub struct Job {
    pub id: JobId,
    pub func: JobFn,
    pub payload: *mut c_void,
}

impl Job {
    pub fn new(id: JobId, func: JobFn, payload: *mut c_void) -> Self {
        Self { id, func, payload }
    }

    /// Identity used by cancellation: all three fields must match.
    pub fn matches(&self, id: JobId, func: JobFn, payload: *mut c_void) -> bool {
        self.id == id && self.func == func && self.payload == payload
    }
}

// SAFETY: a `Job` is only ever touched while the pool mutex is held (queue
// storage) or by the single worker thread that popped it (execution). The
// pointer itself crossing threads is sound as long as the caller's payload
// is; that obligation is documented on `ThreadPool::add_job`.
unsafe impl Send for Job {}
